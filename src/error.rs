//! Error types for the focus-guard validation library.
//!
//! All fallible operations in the crate return [`Result`], whose error type
//! is the [`FocusError`] enum. Variants are grouped by the phase in which
//! they occur: catalog loading, plan construction, check execution, and
//! query-engine failures.

use thiserror::Error;

/// The main error type for the focus-guard library.
#[derive(Error, Debug)]
pub enum FocusError {
    /// A malformed rule catalog that cannot be loaded.
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// A rule references a check kind that is not in the generator registry.
    #[error("Rule '{rule_id}' uses unknown check kind '{kind}'")]
    UnknownCheckKind {
        /// The rule carrying the unknown kind
        rule_id: String,
        /// The unrecognized check kind token
        kind: String,
    },

    /// A generator parameter required by the check kind is absent.
    #[error("Rule '{rule_id}' is missing required parameter '{key}' for check '{kind}'")]
    MissingParameter {
        rule_id: String,
        kind: String,
        key: String,
    },

    /// A generator parameter is present but has the wrong shape.
    #[error("Rule '{rule_id}' has invalid parameter '{key}': {message}")]
    InvalidParameter {
        rule_id: String,
        key: String,
        message: String,
    },

    /// Two rules in the same catalog version share a rule id.
    #[error("Duplicate rule id '{rule_id}' in catalog")]
    DuplicateRuleId { rule_id: String },

    /// A `model_rule_reference` points at a rule id that does not exist.
    #[error("Rule '{rule_id}' references unknown rule '{target}'")]
    DanglingReference { rule_id: String, target: String },

    /// The dependency graph contains a cycle. The `cycle` field holds one
    /// concrete shortest cycle; `dot` holds a Graphviz dump of the strongly
    /// connected component for diagnostics.
    #[error("Dependency cycle detected: {}", cycle.join(" -> "))]
    CycleDetected { cycle: Vec<String>, dot: String },

    /// An internal invariant of the plan builder was violated. Seeing this
    /// error indicates a bug in the resolver, not bad input.
    #[error("Plan error: {0}")]
    Plan(String),

    /// A fatal query-engine failure that aborted the run. The partial
    /// report has every unfinished rule marked aborted.
    #[error("Query engine failure: {message}")]
    EngineAborted {
        message: String,
        report: Box<crate::report::Report>,
    },

    /// Error from DataFusion operations.
    #[error("DataFusion error: {0}")]
    DataFusion(#[from] datafusion::error::DataFusionError),

    /// Error from Arrow operations.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Error from catalog JSON parsing.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error from I/O operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A rejected SQL identifier, literal, or predicate fragment.
    #[error("Security error: {0}")]
    Security(String),

    /// Generic internal error for unexpected conditions.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A type alias for `Result<T, FocusError>` used throughout the library.
pub type Result<T> = std::result::Result<T, FocusError>;

impl FocusError {
    /// Creates a catalog error with the given message.
    pub fn catalog(message: impl Into<String>) -> Self {
        Self::Catalog(message.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error is fatal at catalog-load time.
    pub fn is_catalog_error(&self) -> bool {
        matches!(
            self,
            Self::Catalog(_)
                | Self::UnknownCheckKind { .. }
                | Self::MissingParameter { .. }
                | Self::InvalidParameter { .. }
                | Self::DuplicateRuleId { .. }
                | Self::DanglingReference { .. }
                | Self::CycleDetected { .. }
        )
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, msg: &str) -> Result<T>;

    /// Adds context with a lazily-built message.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<FocusError>,
{
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| FocusError::Internal(format!("{}: {}", msg, e.into())))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| FocusError::Internal(format!("{}: {}", f(), e.into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_check_kind_display() {
        let err = FocusError::UnknownCheckKind {
            rule_id: "BilledCost-C-001-M".to_string(),
            kind: "frobnicate".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Rule 'BilledCost-C-001-M' uses unknown check kind 'frobnicate'"
        );
        assert!(err.is_catalog_error());
    }

    #[test]
    fn test_cycle_display_enumerates_nodes() {
        let err = FocusError::CycleDetected {
            cycle: vec!["A".into(), "B".into(), "A".into()],
            dot: String::new(),
        };
        assert_eq!(err.to_string(), "Dependency cycle detected: A -> B -> A");
    }

    #[test]
    fn test_error_context() {
        fn failing() -> Result<()> {
            Err(FocusError::internal("boom"))
        }
        let err = failing().context("while loading").unwrap_err();
        assert!(err.to_string().contains("while loading"));
    }

    #[test]
    fn test_engine_error_is_not_catalog_error() {
        let err = FocusError::Plan("unresolved blockers".into());
        assert!(!err.is_catalog_error());
    }
}
