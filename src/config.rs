//! Planner configuration: split bound and work budget.
//!
//! Configuration can be built in code or loaded from TOML. Every field has a
//! default, so an empty document is a valid configuration:
//!
//! ```toml
//! max_split_size = 3
//!
//! [budget]
//! max_subsets = 100000
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Largest arena a session can address.
pub const MAX_PLAN_NODES: usize = u32::MAX as usize;

/// Limits on the work a single planning session may perform.
///
/// Exceeding any of them aborts the call with
/// [`PlanError::BudgetExceeded`](crate::error::PlanError::BudgetExceeded).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    /// Maximum number of nodes a session's plan arena may hold.
    #[serde(default = "default_max_plan_nodes")]
    pub max_plan_nodes: usize,
    /// Maximum number of sub-fact-sets examined by decomposition.
    #[serde(default = "default_max_subsets")]
    pub max_subsets: usize,
    /// Maximum recursion depth of any planner.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Maximum size of a materialized linearization set.
    #[serde(default = "default_max_linearizations")]
    pub max_linearizations: usize,
    /// Maximum number of distinct states one exhaustive walk may visit.
    #[serde(default = "default_max_walk_states")]
    pub max_walk_states: usize,
}

fn default_max_plan_nodes() -> usize {
    2_000_000
}
fn default_max_subsets() -> usize {
    1 << 20
}
fn default_max_depth() -> usize {
    512
}
fn default_max_linearizations() -> usize {
    5_000_000
}
fn default_max_walk_states() -> usize {
    1 << 16
}
fn default_max_split_size() -> usize {
    4
}

impl Default for Budget {
    fn default() -> Self {
        Self {
            max_plan_nodes: default_max_plan_nodes(),
            max_subsets: default_max_subsets(),
            max_depth: default_max_depth(),
            max_linearizations: default_max_linearizations(),
            max_walk_states: default_max_walk_states(),
        }
    }
}

/// Configuration for planning sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Largest fact subset split off as a head sentence during decomposition.
    #[serde(default = "default_max_split_size")]
    pub max_split_size: usize,
    /// Work limits.
    #[serde(default)]
    pub budget: Budget,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_split_size: default_max_split_size(),
            budget: Budget::default(),
        }
    }
}

impl PlannerConfig {
    /// Parse a configuration from a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Self::parse(source, "<inline>")
    }

    /// Load a configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::parse(&source, &path.display().to_string())
    }

    fn parse(source: &str, origin: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source).map_err(|e| ConfigError::Parse {
            path: origin.to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration back to TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid {
            message: format!("cannot serialize config: {e}"),
        })
    }

    /// Reject configurations under which no planning call could succeed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_split_size == 0 {
            return Err(ConfigError::Invalid {
                message: "max_split_size must be >= 1".into(),
            });
        }
        let budget = &self.budget;
        for (name, value) in [
            ("max_plan_nodes", budget.max_plan_nodes),
            ("max_subsets", budget.max_subsets),
            ("max_depth", budget.max_depth),
            ("max_linearizations", budget.max_linearizations),
            ("max_walk_states", budget.max_walk_states),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    message: format!("budget.{name} must be > 0"),
                });
            }
        }
        // Plan handles are 32-bit.
        if budget.max_plan_nodes > MAX_PLAN_NODES {
            return Err(ConfigError::Invalid {
                message: format!("budget.max_plan_nodes must be <= {MAX_PLAN_NODES}"),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = PlannerConfig::from_toml_str("").unwrap();
        assert_eq!(config, PlannerConfig::default());
        assert_eq!(config.max_split_size, 4);
    }

    #[test]
    fn partial_budget_keeps_other_defaults() {
        let config = PlannerConfig::from_toml_str(
            "max_split_size = 2\n[budget]\nmax_subsets = 99\n",
        )
        .unwrap();
        assert_eq!(config.max_split_size, 2);
        assert_eq!(config.budget.max_subsets, 99);
        assert_eq!(config.budget.max_depth, 512);
    }

    #[test]
    fn zero_split_size_is_rejected() {
        let err = PlannerConfig::from_toml_str("max_split_size = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn zero_budget_is_rejected() {
        let mut config = PlannerConfig::default();
        config.budget.max_depth = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_depth"));
    }

    #[test]
    fn plan_node_budget_is_capped_at_handle_width() {
        let mut config = PlannerConfig::default();
        config.budget.max_plan_nodes = MAX_PLAN_NODES;
        assert!(config.validate().is_ok());

        config.budget.max_plan_nodes = usize::MAX;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_plan_nodes"));
    }

    #[test]
    fn zero_walk_states_is_rejected() {
        let err = PlannerConfig::from_toml_str("[budget]\nmax_walk_states = 0\n").unwrap_err();
        assert!(err.to_string().contains("max_walk_states"));
    }

    #[test]
    fn malformed_toml_reports_parse_error() {
        let err = PlannerConfig::from_toml_str("max_split_size = \"four\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn toml_roundtrip() {
        let mut config = PlannerConfig::default();
        config.budget.max_linearizations = 10;
        let text = config.to_toml_string().unwrap();
        assert_eq!(PlannerConfig::from_toml_str(&text).unwrap(), config);
    }
}
