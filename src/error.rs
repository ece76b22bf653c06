//! # Compiler Error Types
//!
//! Error kinds for the compilation core (spec §7). Relational-lowering
//! failure and predicate-inversion failure are deliberately *not* error
//! variants here — both are silent fallbacks the caller handles by
//! consuming an `Option::None`, never a `Result::Err`.

use thiserror::Error;

/// Errors raised by the compilation pipeline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// A Core IR invariant was violated (e.g. a pattern binds a name
    /// already in scope). Always a bug in an earlier pass.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// A name was not found in the environment. Should have been caught
    /// by type resolution before reaching this compiler.
    #[error("unknown identifier: {0}")]
    UnknownIdentifier(String),

    /// A bounded fixpoint loop (the inliner) did not converge within its
    /// configured iteration cap.
    #[error("internal limit exceeded in {pass}: did not converge within {iterations} iterations")]
    InternalLimit {
        /// Name of the pass that hit the cap.
        pass: &'static str,
        /// The configured cap that was exceeded.
        iterations: usize,
    },

    /// A construct the compiler has no rule for (e.g. an unrecognised
    /// surface operator).
    #[error("unsupported construct: {0}")]
    Unsupported(String),
}

/// Result alias used throughout the compilation pipeline.
pub type CompileResult<T> = Result<T, CompileError>;
