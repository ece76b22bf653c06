//! Configuration System
//!
//! Provides hierarchical configuration loading from:
//! - flowml.toml (default configuration)
//! - flowml.local.toml (git-ignored local overrides)
//! - Environment variables (`FLOWML_*` prefix)
//!
//! ## Example
//!
//! ```toml
//! # flowml.toml
//! [optimizer]
//! max_inline_iterations = 20
//! max_ppt_depth = 64
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! FLOWML_OPTIMIZER__MAX_INLINE_ITERATIONS=10
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Top-level compiler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilerConfig {
    pub optimizer: OptimizerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Knobs for the bounded fixpoint loops described in spec §5.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Cap on analyzer/inliner/relationalizer fixpoint iterations before
    /// compilation fails with `CompileError::InternalLimit` (spec §5,
    /// default 20).
    #[serde(default = "default_max_inline_iterations")]
    pub max_inline_iterations: usize,

    /// Cap on Perfect Process Tree construction depth. Not specified
    /// numerically by spec.md; see DESIGN.md Open Question 4. Exceeding it
    /// is treated as a predicate-inversion failure, not a `CompileError`.
    #[serde(default = "default_max_ppt_depth")]
    pub max_ppt_depth: usize,
}

/// Logging configuration (level only; format is fixed to `tracing`'s
/// default human-readable subscriber).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_max_inline_iterations() -> usize {
    20
}
fn default_max_ppt_depth() -> usize {
    64
}
fn default_log_level() -> String {
    "info".to_string()
}

impl CompilerConfig {
    /// Load configuration from the default locations.
    ///
    /// Merges in order:
    /// 1. `flowml.toml` (base configuration)
    /// 2. `flowml.local.toml` (local overrides, git-ignored)
    /// 3. Environment variables (`FLOWML_*` prefix)
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("flowml.toml"))
            .merge(Toml::file("flowml.local.toml"))
            .merge(Env::prefixed("FLOWML_").split("__"))
            .extract()
    }

    /// Load configuration from a specific file path.
    pub fn from_file(path: &str) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("FLOWML_").split("__"))
            .extract()
    }
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            optimizer: OptimizerConfig {
                max_inline_iterations: default_max_inline_iterations(),
                max_ppt_depth: default_max_ppt_depth(),
            },
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_spec_mandated_iteration_cap() {
        let config = CompilerConfig::default();
        assert_eq!(config.optimizer.max_inline_iterations, 20);
        assert_eq!(config.optimizer.max_ppt_depth, 64);
    }

    #[test]
    fn config_round_trips_through_toml() {
        let config = CompilerConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        assert!(toml_str.contains("[optimizer]"));
        let parsed: CompilerConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(
            parsed.optimizer.max_inline_iterations,
            config.optimizer.max_inline_iterations
        );
    }
}
