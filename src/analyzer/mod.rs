//! # Analyzer
//!
//! A single read-only pass that counts uses of each binder and classifies
//! each one's inlining safety (spec §4.4). The classification feeds the
//! Inliner (§4.5): only `Dead`, `Atomic`, and `OnceSafe` permit
//! unconditional inlining.
//!
//! Grounded on the teacher's `recursion::DependencyGraph`-style
//! single-pass accumulation (build a map while walking, then query it),
//! generalized from inter-relation dependency counting to per-binder use
//! counting over [`crate::shuttle::EnvVisitor`].

use crate::core_ir::{Expr, Ident};
use crate::environment::Environment;
use crate::shuttle::EnvVisitor;
use std::collections::HashMap;

/// A binder's inlining-safety classification (spec §4.4, glossary "Use
/// classification").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Use {
    /// Zero uses — the binding may be dropped.
    Dead,
    /// Exactly one use, and the right-hand side is a literal or bare
    /// identifier — always safe to substitute.
    Atomic,
    /// Exactly one use, and the right-hand side cannot observe or change
    /// external state.
    OnceSafe,
    /// More than one use, right-hand side is side-effect-free: safe to
    /// duplicate.
    MultiSafe,
    /// More than one use with a right-hand side that is not known to be
    /// side-effect-free, or any use whose right-hand side could not be
    /// classified as safe at all — never inlined unconditionally.
    MultiUnsafe,
}

impl Use {
    /// True for the three classes spec §4.4 permits unconditional
    /// inlining for.
    pub fn permits_unconditional_inline(self) -> bool {
        matches!(self, Use::Dead | Use::Atomic | Use::OnceSafe)
    }
}

/// The result of running the Analyzer over a tree: per-binder use counts
/// and the right-hand side each count was measured against.
#[derive(Debug, Default)]
pub struct Analysis {
    uses: HashMap<Ident, usize>,
    rhs: HashMap<Ident, Expr>,
}

impl Analysis {
    pub fn use_count(&self, id: &Ident) -> usize {
        self.uses.get(id).copied().unwrap_or(0)
    }

    pub fn rhs_of(&self, id: &Ident) -> Option<&Expr> {
        self.rhs.get(id)
    }

    /// Classify `id` per spec §4.4. Binders the Analyzer never saw a
    /// right-hand side for (e.g. function parameters, which are bound at
    /// call time rather than by a declaration) are conservatively
    /// `MultiUnsafe` once used, since substituting them requires
    /// beta-reduction (inliner rule 3), not identifier substitution.
    pub fn classify(&self, id: &Ident) -> Use {
        let count = self.use_count(id);
        if count == 0 {
            return Use::Dead;
        }
        match self.rhs.get(id) {
            None => Use::MultiUnsafe,
            Some(rhs) => {
                if count == 1 && rhs.is_atomic() {
                    Use::Atomic
                } else if rhs.is_pure_shape() {
                    if count == 1 {
                        Use::OnceSafe
                    } else {
                        Use::MultiSafe
                    }
                } else {
                    Use::MultiUnsafe
                }
            }
        }
    }
}

struct AnalyzerVisitor {
    analysis: Analysis,
}

impl EnvVisitor for AnalyzerVisitor {
    fn visit_expr(&mut self, env: &Environment, expr: &Expr) {
        match expr {
            Expr::Var(id, _) => {
                *self.analysis.uses.entry(id.clone()).or_insert(0) += 1;
            }
            Expr::Let { pat, value, .. } => {
                if let Some(id) = pat.as_ident() {
                    self.analysis.rhs.insert(id.clone(), (**value).clone());
                }
            }
            Expr::LetRec { bindings, .. } => {
                for (id, rhs) in bindings {
                    self.analysis.rhs.insert(id.clone(), rhs.clone());
                }
            }
            Expr::Comprehension { sources, .. } => {
                for src in sources {
                    if let Some(id) = src.pat.as_ident() {
                        self.analysis.rhs.insert(id.clone(), src.expr.clone());
                    }
                }
            }
            _ => {}
        }
        self.walk_expr(env, expr);
    }
}

/// Run the Analyzer over `expr`, producing a fresh `Analysis`. Expects
/// `expr` to already be uniquified (spec §2 control flow: Uniquifier runs
/// before the Analyzer), so that distinct binders never collide as
/// `HashMap` keys.
pub fn analyze(expr: &Expr) -> Analysis {
    let mut visitor = AnalyzerVisitor {
        analysis: Analysis::default(),
    };
    visitor.visit_expr(&Environment::empty(), expr);
    visitor.analysis
}
