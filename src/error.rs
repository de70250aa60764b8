//! Rich diagnostic error types for the chimera-plan engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so callers know exactly
//! what went wrong and how to fix it.
//!
//! Note that "no valid plan" is never an error: disconnected graphs and
//! infeasible constraint assignments produce empty linearization sets.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the chimera-plan engine.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text) through to the caller.
#[derive(Debug, Error, Diagnostic)]
pub enum ChimeraError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Graph errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    #[error("fact #{index} has a blank {field}")]
    #[diagnostic(
        code(chimera::graph::empty_field),
        help(
            "Every fact must carry a non-empty subject, relation and object. \
             Drop the fact or fill in the missing component before planning."
        )
    )]
    EmptyField { index: usize, field: &'static str },

    #[error("could not read fact list as JSON: {message}")]
    #[diagnostic(
        code(chimera::graph::json),
        help(
            "Facts are expected as a JSON array of [subject, relation, object] \
             string triples, e.g. [[\"A\", \"birthPlace\", \"B\"]]."
        )
    )]
    Json { message: String },
}

// ---------------------------------------------------------------------------
// Planning errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum PlanError {
    #[error("planning budget exceeded: more than {limit} {resource}")]
    #[diagnostic(
        code(chimera::plan::budget_exceeded),
        help(
            "The search space of this fact set is larger than the configured budget. \
             The result is unknown, not empty. Raise the matching limit in \
             `Budget`, lower `max_split_size`, or plan fewer facts at once."
        )
    )]
    BudgetExceeded { resource: &'static str, limit: usize },

    #[error("too many facts for subset enumeration: {count} (at most {max})")]
    #[diagnostic(
        code(chimera::plan::too_many_facts),
        help(
            "Constraint decomposition scans every subset of the remaining facts. \
             Split the input into smaller groups before aligning it to a reference."
        )
    )]
    TooManyFacts { count: usize, max: usize },

    #[error("plan node {id} does not belong to this arena")]
    #[diagnostic(
        code(chimera::plan::unknown_plan),
        help("Plan handles are only valid for the session that produced them.")
    )]
    UnknownPlan { id: usize },
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read planner config: {path}")]
    #[diagnostic(
        code(chimera::config::read),
        help("Ensure the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse planner config: {path}: {message}")]
    #[diagnostic(
        code(chimera::config::parse),
        help("Check the TOML syntax and the field names of the planner config.")
    )]
    Parse { path: String, message: String },

    #[error("invalid planner config: {message}")]
    #[diagnostic(
        code(chimera::config::invalid),
        help("Check the PlannerConfig fields. {message}")
    )]
    Invalid { message: String },
}

/// Convenience alias for functions returning chimera-plan results.
pub type ChimeraResult<T> = std::result::Result<T, ChimeraError>;

/// Result type for graph construction.
pub type GraphResult<T> = std::result::Result<T, GraphError>;

/// Result type for planning operations.
pub type PlanResult<T> = std::result::Result<T, PlanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_error_converts_to_chimera_error() {
        let err = GraphError::EmptyField {
            index: 2,
            field: "relation",
        };
        let top: ChimeraError = err.into();
        assert!(matches!(
            top,
            ChimeraError::Graph(GraphError::EmptyField { index: 2, .. })
        ));
    }

    #[test]
    fn plan_error_converts_to_chimera_error() {
        let err = PlanError::BudgetExceeded {
            resource: "subsets",
            limit: 10,
        };
        let top: ChimeraError = err.into();
        assert!(matches!(top, ChimeraError::Plan(PlanError::BudgetExceeded { .. })));
    }

    #[test]
    fn error_display_messages_are_descriptive() {
        let err = PlanError::BudgetExceeded {
            resource: "plan nodes",
            limit: 1_000,
        };
        let msg = format!("{err}");
        assert!(msg.contains("1000"));
        assert!(msg.contains("plan nodes"));

        let err = GraphError::EmptyField {
            index: 0,
            field: "subject",
        };
        assert_eq!(format!("{err}"), "fact #0 has a blank subject");
    }
}
