//! Per-rule outcome records and the indexed validation report.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Terminal status of a rule after a validation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// The rule executed and found no violations.
    Pass,
    /// The rule executed and found violations, or a required column was
    /// missing from the dataset.
    Fail,
    /// The rule's applicability criteria were not satisfied by this run.
    SkippedNonApplicable,
    /// The rule cannot be validated statically.
    SkippedDynamic,
    /// An upstream dependency failed or was skipped, so this rule was not
    /// evaluated.
    SkippedUpstream,
    /// The run was cancelled or aborted before this rule started.
    Aborted,
}

impl OutcomeStatus {
    /// Returns true for any of the skipped statuses (including aborted).
    pub fn is_skipped(&self) -> bool {
        matches!(
            self,
            Self::SkippedNonApplicable | Self::SkippedDynamic | Self::SkippedUpstream | Self::Aborted
        )
    }
}

/// The outcome of a single rule. Created exactly once per rule per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    /// Terminal status
    pub status: OutcomeStatus,
    /// Number of violating rows (or columns, for schema-level checks)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub violations: Option<u64>,
    /// Human-readable diagnostic for failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Why the rule was skipped, when it was
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Sample offending values, when collection was enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub samples: Option<Vec<String>>,
}

impl Outcome {
    /// Creates a passing outcome.
    pub fn pass() -> Self {
        Self {
            status: OutcomeStatus::Pass,
            violations: Some(0),
            message: None,
            reason: None,
            samples: None,
        }
    }

    /// Creates a failing outcome with a violation count and message.
    pub fn fail(violations: u64, message: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Fail,
            violations: Some(violations),
            message: Some(message.into()),
            reason: None,
            samples: None,
        }
    }

    /// Creates a non-applicable skip outcome.
    pub fn skipped_non_applicable(reason: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::SkippedNonApplicable,
            violations: None,
            message: None,
            reason: Some(reason.into()),
            samples: None,
        }
    }

    /// Creates a dynamic skip outcome.
    pub fn skipped_dynamic() -> Self {
        Self {
            status: OutcomeStatus::SkippedDynamic,
            violations: None,
            message: None,
            reason: Some("rule cannot be validated statically".to_string()),
            samples: None,
        }
    }

    /// Creates an upstream skip outcome citing the upstream rule.
    pub fn skipped_upstream(reason: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::SkippedUpstream,
            violations: None,
            message: None,
            reason: Some(reason.into()),
            samples: None,
        }
    }

    /// Creates an aborted outcome.
    pub fn aborted() -> Self {
        Self {
            status: OutcomeStatus::Aborted,
            violations: None,
            message: None,
            reason: Some("cancelled".to_string()),
            samples: None,
        }
    }

    /// Attaches sample offending values.
    pub fn with_samples(mut self, samples: Vec<String>) -> Self {
        self.samples = Some(samples);
        self
    }

    /// Returns true if the rule passed.
    pub fn is_pass(&self) -> bool {
        self.status == OutcomeStatus::Pass
    }

    /// Returns true if the rule failed.
    pub fn is_fail(&self) -> bool {
        self.status == OutcomeStatus::Fail
    }
}

/// Counts of outcomes per status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub passed: usize,
    pub failed: usize,
    pub skipped_non_applicable: usize,
    pub skipped_dynamic: usize,
    pub skipped_upstream: usize,
    pub aborted: usize,
    pub total: usize,
}

/// The product of a validation run: one outcome per rule, keyed and
/// iterated in lexicographic rule-id order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Timestamp when the run started (RFC 3339)
    pub timestamp: String,
    /// Outcome per rule id
    pub by_rule_id: BTreeMap<String, Outcome>,
}

impl Report {
    /// Creates an empty report stamped with the current time.
    pub fn new() -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            by_rule_id: BTreeMap::new(),
        }
    }

    /// Records the outcome for a rule. Outcomes are write-once; recording a
    /// second outcome for the same rule id is ignored and reported false.
    pub fn record(&mut self, rule_id: impl Into<String>, outcome: Outcome) -> bool {
        use std::collections::btree_map::Entry;
        match self.by_rule_id.entry(rule_id.into()) {
            Entry::Vacant(slot) => {
                slot.insert(outcome);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    /// Returns the outcome for a rule, if recorded.
    pub fn outcome(&self, rule_id: &str) -> Option<&Outcome> {
        self.by_rule_id.get(rule_id)
    }

    /// Returns true when every recorded outcome is a pass or a skip.
    pub fn is_conformant(&self) -> bool {
        !self.by_rule_id.values().any(Outcome::is_fail)
    }

    /// Computes per-status counts.
    pub fn summary(&self) -> ReportSummary {
        let mut summary = ReportSummary::default();
        for outcome in self.by_rule_id.values() {
            summary.total += 1;
            match outcome.status {
                OutcomeStatus::Pass => summary.passed += 1,
                OutcomeStatus::Fail => summary.failed += 1,
                OutcomeStatus::SkippedNonApplicable => summary.skipped_non_applicable += 1,
                OutcomeStatus::SkippedDynamic => summary.skipped_dynamic += 1,
                OutcomeStatus::SkippedUpstream => summary.skipped_upstream += 1,
                OutcomeStatus::Aborted => summary.aborted += 1,
            }
        }
        summary
    }

    /// Iterates outcomes in lexicographic rule-id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Outcome)> {
        self.by_rule_id.iter().map(|(id, o)| (id.as_str(), o))
    }
}

impl Default for Report {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_is_write_once() {
        let mut report = Report::new();
        assert!(report.record("A", Outcome::pass()));
        assert!(!report.record("A", Outcome::fail(3, "later")));
        assert!(report.outcome("A").unwrap().is_pass());
    }

    #[test]
    fn test_iteration_is_lexicographic() {
        let mut report = Report::new();
        report.record("B-002", Outcome::pass());
        report.record("A-001", Outcome::fail(1, "x"));
        report.record("B-001", Outcome::skipped_dynamic());
        let ids: Vec<&str> = report.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["A-001", "B-001", "B-002"]);
    }

    #[test]
    fn test_summary_counts() {
        let mut report = Report::new();
        report.record("A", Outcome::pass());
        report.record("B", Outcome::fail(2, "bad"));
        report.record("C", Outcome::skipped_non_applicable("no token"));
        report.record("D", Outcome::aborted());
        let summary = report.summary();
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped_non_applicable, 1);
        assert_eq!(summary.aborted, 1);
        assert_eq!(summary.total, 4);
        assert!(!report.is_conformant());
    }

    #[test]
    fn test_aborted_reason_is_cancelled() {
        let outcome = Outcome::aborted();
        assert_eq!(outcome.status, OutcomeStatus::Aborted);
        assert_eq!(outcome.reason.as_deref(), Some("cancelled"));
    }
}
