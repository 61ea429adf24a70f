//! Run configuration for the validator.

use std::collections::BTreeSet;
use std::time::Duration;

/// Policy for rules whose lifecycle status is `Draft`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DraftPolicy {
    /// Draft rules are loaded but reported as skipped (the default).
    #[default]
    Skip,
    /// Draft rules execute like active rules.
    Include,
}

/// Configuration for resolving, planning, and executing a validation run.
///
/// All settings have defaults matching a plain conformance run: the dataset
/// is registered as `focus_data`, checks run one at a time, drafts are
/// skipped, and no applicability tokens are asserted.
///
/// # Examples
///
/// ```rust
/// use focus_guard::config::ValidatorConfig;
///
/// let config = ValidatorConfig::default()
///     .with_target_prefix("BilledCost")
///     .with_applicability(["AVAILABILITY_ZONE_SUPPORTED"])
///     .with_parallelism(4);
/// assert_eq!(config.table_name, "focus_data");
/// ```
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Name under which the dataset is registered in the query engine
    pub table_name: String,
    /// Restrict the run to rules whose id starts with this prefix
    pub target_prefix: Option<String>,
    /// Dataset-global applicability tokens asserted for this run
    pub applicability: BTreeSet<String>,
    /// How to treat draft rules
    pub draft_policy: DraftPolicy,
    /// Maximum concurrent leaf queries within a layer
    pub parallelism: usize,
    /// Optional wall-clock limit for the whole run
    pub deadline: Option<Duration>,
    /// Collect sample offending values for failing row-level checks
    pub show_violations: bool,
    /// How many sample values to collect per failing check
    pub sample_limit: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            table_name: "focus_data".to_string(),
            target_prefix: None,
            applicability: BTreeSet::new(),
            draft_policy: DraftPolicy::Skip,
            parallelism: 1,
            deadline: None,
            show_violations: false,
            sample_limit: 2,
        }
    }
}

impl ValidatorConfig {
    /// Sets the table name the dataset is registered under.
    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    /// Restricts the run to rules with the given id prefix. Rules outside
    /// the prefix are still pulled in when transitively referenced.
    pub fn with_target_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.target_prefix = Some(prefix.into());
        self
    }

    /// Asserts applicability tokens for this run.
    pub fn with_applicability<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.applicability = tokens.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the draft-rule policy.
    pub fn with_draft_policy(mut self, policy: DraftPolicy) -> Self {
        self.draft_policy = policy;
        self
    }

    /// Sets the maximum number of concurrent leaf queries within a layer.
    /// Values below 1 are clamped to 1.
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    /// Sets a wall-clock deadline for the run. Rules not started before the
    /// deadline receive an aborted outcome.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Enables collection of sample offending values on failure.
    pub fn with_show_violations(mut self, enabled: bool) -> Self {
        self.show_violations = enabled;
        self
    }

    /// Sets the number of sample values collected per failing check.
    pub fn with_sample_limit(mut self, limit: usize) -> Self {
        self.sample_limit = limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ValidatorConfig::default();
        assert_eq!(config.table_name, "focus_data");
        assert_eq!(config.parallelism, 1);
        assert_eq!(config.draft_policy, DraftPolicy::Skip);
        assert!(config.applicability.is_empty());
        assert!(!config.show_violations);
        assert_eq!(config.sample_limit, 2);
    }

    #[test]
    fn test_parallelism_clamped() {
        let config = ValidatorConfig::default().with_parallelism(0);
        assert_eq!(config.parallelism, 1);
    }

    #[test]
    fn test_builder_chain() {
        let config = ValidatorConfig::default()
            .with_table_name("cost_data")
            .with_target_prefix("BilledCost")
            .with_applicability(["A", "B"])
            .with_deadline(Duration::from_secs(60));
        assert_eq!(config.table_name, "cost_data");
        assert_eq!(config.target_prefix.as_deref(), Some("BilledCost"));
        assert_eq!(config.applicability.len(), 2);
        assert!(config.deadline.is_some());
    }
}
