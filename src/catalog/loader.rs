//! Rule catalog loading.
//!
//! The loader is a pure function from `(version, source)` to a list of
//! typed rules. Every structural problem is fatal here, before any check
//! executes: unknown check kinds, missing generator parameters, malformed
//! composite requirements, duplicate ids, and dangling references.

use super::rule::{Requirement, Rule};
use crate::checks::CheckKind;
use crate::error::{FocusError, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::debug;

/// Loads a catalog version from an aggregated JSON document.
///
/// `source` must be a JSON array of rule objects shaped as described by the
/// catalog schema. The returned rules are fully validated and frozen.
pub fn load_rules(version: &str, source: &str) -> Result<Vec<Rule>> {
    let raw: Vec<serde_json::Value> = serde_json::from_str(source)?;
    let mut rules: Vec<Rule> = Vec::with_capacity(raw.len());
    let mut seen: BTreeSet<String> = BTreeSet::new();

    for value in raw {
        let rule_id = value
            .get("rule_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| FocusError::catalog("rule object is missing 'rule_id'"))?
            .to_string();

        // Surface unknown kinds as a dedicated error instead of a generic
        // deserialization failure.
        if let Some(kind) = value.get("check_type").and_then(|v| v.as_str()) {
            if serde_json::from_value::<CheckKind>(serde_json::Value::String(kind.to_string()))
                .is_err()
            {
                return Err(FocusError::UnknownCheckKind {
                    rule_id,
                    kind: kind.to_string(),
                });
            }
        }

        let mut rule: Rule = serde_json::from_value(value)
            .map_err(|e| FocusError::catalog(format!("rule '{rule_id}': {e}")))?;

        if !seen.insert(rule.rule_id.clone()) {
            return Err(FocusError::DuplicateRuleId {
                rule_id: rule.rule_id,
            });
        }
        validate_rule(&mut rule)?;
        rules.push(rule);
    }

    let ids: BTreeSet<&str> = rules.iter().map(|r| r.rule_id.as_str()).collect();
    for rule in &rules {
        for target in rule.validation_criteria.referenced_rule_ids() {
            if !ids.contains(target) {
                return Err(FocusError::DanglingReference {
                    rule_id: rule.rule_id.clone(),
                    target: target.to_string(),
                });
            }
        }
    }

    debug!(
        catalog.version = %version,
        catalog.rules = rules.len(),
        "Loaded rule catalog"
    );
    Ok(rules)
}

/// Checks requirement shape against the rule's check kind and freezes
/// generator parameters (required keys present, defaults merged).
fn validate_rule(rule: &mut Rule) -> Result<()> {
    let rule_id = rule.rule_id.clone();
    if let Some(condition) = &rule.row_condition {
        crate::security::vet_predicate(condition).map_err(|e| {
            FocusError::catalog(format!("rule '{rule_id}': invalid row_condition: {e}"))
        })?;
    }
    match rule.check_type {
        CheckKind::CompositeAnd | CheckKind::CompositeOr => {
            let declared = rule.combiner();
            let actual = rule.validation_criteria.logic();
            if declared != actual {
                return Err(FocusError::catalog(format!(
                    "rule '{rule_id}': check type '{}' does not match its requirement shape",
                    rule.check_type.as_str()
                )));
            }
        }
        CheckKind::ModelRuleReference => {
            if !matches!(rule.validation_criteria, Requirement::Ref { .. }) {
                return Err(FocusError::catalog(format!(
                    "rule '{rule_id}': model_rule_reference requires a 'ref' requirement"
                )));
            }
        }
        leaf_kind => {
            let Requirement::Leaf { check, .. } = &rule.validation_criteria else {
                return Err(FocusError::catalog(format!(
                    "rule '{rule_id}': leaf check type '{}' requires a leaf requirement",
                    leaf_kind.as_str()
                )));
            };
            if *check != leaf_kind {
                return Err(FocusError::catalog(format!(
                    "rule '{rule_id}': check type '{}' disagrees with requirement check '{}'",
                    leaf_kind.as_str(),
                    check.as_str()
                )));
            }
        }
    }
    validate_requirement(&rule_id, &mut rule.validation_criteria)
}

fn validate_requirement(rule_id: &str, requirement: &mut Requirement) -> Result<()> {
    match requirement {
        Requirement::Leaf { check, params } => check.validate_params(rule_id, params),
        Requirement::Ref { .. } => Ok(()),
        Requirement::And { all_of } => validate_children(rule_id, all_of),
        Requirement::Or { any_of } => validate_children(rule_id, any_of),
    }
}

fn validate_children(rule_id: &str, children: &mut [Requirement]) -> Result<()> {
    if children.is_empty() {
        return Err(FocusError::catalog(format!(
            "rule '{rule_id}': composite requirement needs a non-empty child list"
        )));
    }
    for (position, child) in children.iter_mut().enumerate() {
        let child_id = format!("{rule_id}#{position}");
        validate_requirement(&child_id, child)?;
    }
    Ok(())
}

/// A loaded, validated catalog version indexed by rule id.
#[derive(Debug, Clone)]
pub struct RuleCatalog {
    version: String,
    rules: BTreeMap<String, Rule>,
}

impl RuleCatalog {
    /// Loads a catalog from an aggregated JSON document.
    pub fn load(version: impl Into<String>, source: &str) -> Result<Self> {
        let version = version.into();
        let rules = load_rules(&version, source)?;
        Ok(Self {
            version,
            rules: rules
                .into_iter()
                .map(|rule| (rule.rule_id.clone(), rule))
                .collect(),
        })
    }

    /// Loads a catalog version from a `version_sets/<version>/` directory.
    ///
    /// Each file may hold a single rule object or an array of rule objects;
    /// files are read in name order so the catalog is deterministic.
    pub fn load_version_dir(root: impl AsRef<Path>, version: &str) -> Result<Self> {
        let dir = root.as_ref().join(version);
        let mut paths: Vec<_> = std::fs::read_dir(&dir)?
            .collect::<std::io::Result<Vec<_>>>()?
            .into_iter()
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let mut merged: Vec<serde_json::Value> = Vec::new();
        for path in &paths {
            let text = std::fs::read_to_string(path)?;
            let value: serde_json::Value = serde_json::from_str(&text)
                .map_err(|e| FocusError::catalog(format!("{}: {e}", path.display())))?;
            match value {
                serde_json::Value::Array(items) => merged.extend(items),
                object => merged.push(object),
            }
        }
        let source = serde_json::to_string(&merged)?;
        Self::load(version, &source)
    }

    /// Returns the catalog version token.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Looks up a rule by id.
    pub fn get(&self, rule_id: &str) -> Option<&Rule> {
        self.rules.get(rule_id)
    }

    /// Iterates rules in lexicographic rule-id order.
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.values()
    }

    /// Number of rules in this catalog version.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true when the catalog holds no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf_rule(id: &str, column: &str) -> serde_json::Value {
        serde_json::json!({
            "rule_id": id,
            "column_id": column,
            "check_type": "value_not_null",
            "validation_criteria": {"check": "value_not_null", "params": {"column": column}},
            "must_satisfy": format!("{column} MUST NOT be null.")
        })
    }

    #[test]
    fn test_load_valid_catalog() {
        let source = serde_json::json!([
            leaf_rule("BilledCost-C-001-M", "BilledCost"),
            {
                "rule_id": "BilledCost-C-000-M",
                "check_type": "composite_and",
                "validation_criteria": {"all_of": [{"ref": "BilledCost-C-001-M"}]},
                "must_satisfy": "All BilledCost constraints hold."
            }
        ]);
        let catalog = RuleCatalog::load("1.2", &source.to_string()).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.version(), "1.2");
        assert!(catalog.get("BilledCost-C-000-M").unwrap().is_composite());
    }

    #[test]
    fn test_duplicate_rule_id_is_error() {
        let source = serde_json::json!([
            leaf_rule("A-C-001-M", "BilledCost"),
            leaf_rule("A-C-001-M", "BilledCost"),
        ]);
        let err = load_rules("1.2", &source.to_string()).unwrap_err();
        assert!(matches!(err, FocusError::DuplicateRuleId { .. }));
    }

    #[test]
    fn test_unknown_check_type_is_error() {
        let source = serde_json::json!([{
            "rule_id": "A-C-001-M",
            "check_type": "frobnicate",
            "validation_criteria": {"check": "value_not_null", "params": {"column": "X"}},
            "must_satisfy": "?"
        }]);
        let err = load_rules("1.2", &source.to_string()).unwrap_err();
        assert!(matches!(err, FocusError::UnknownCheckKind { .. }));
    }

    #[test]
    fn test_missing_parameter_is_error() {
        let source = serde_json::json!([{
            "rule_id": "A-C-001-M",
            "check_type": "value_not_null",
            "validation_criteria": {"check": "value_not_null"},
            "must_satisfy": "?"
        }]);
        let err = load_rules("1.2", &source.to_string()).unwrap_err();
        assert!(matches!(err, FocusError::MissingParameter { .. }));
    }

    #[test]
    fn test_dangling_reference_is_error() {
        let source = serde_json::json!([{
            "rule_id": "A-C-000-M",
            "check_type": "composite_and",
            "validation_criteria": {"all_of": [{"ref": "Missing-C-001-M"}]},
            "must_satisfy": "?"
        }]);
        let err = load_rules("1.2", &source.to_string()).unwrap_err();
        assert!(matches!(err, FocusError::DanglingReference { .. }));
    }

    #[test]
    fn test_empty_composite_is_error() {
        let source = serde_json::json!([{
            "rule_id": "A-C-000-M",
            "check_type": "composite_or",
            "validation_criteria": {"any_of": []},
            "must_satisfy": "?"
        }]);
        let err = load_rules("1.2", &source.to_string()).unwrap_err();
        assert!(err.to_string().contains("non-empty"));
    }

    #[test]
    fn test_defaults_merged_into_params() {
        let source = serde_json::json!([{
            "rule_id": "BillingPeriodStart-C-002-M",
            "check_type": "format_datetime",
            "validation_criteria": {
                "check": "format_datetime",
                "params": {"column": "BillingPeriodStart"}
            },
            "must_satisfy": "?"
        }]);
        let rules = load_rules("1.2", &source.to_string()).unwrap();
        let Requirement::Leaf { params, .. } = &rules[0].validation_criteria else {
            panic!("expected leaf requirement");
        };
        assert_eq!(params.str("format").unwrap(), "rfc3339");
    }

    #[test]
    fn test_mismatched_leaf_kind_is_error() {
        let source = serde_json::json!([{
            "rule_id": "A-C-001-M",
            "check_type": "type_string",
            "validation_criteria": {"check": "value_not_null", "params": {"column": "X"}},
            "must_satisfy": "?"
        }]);
        let err = load_rules("1.2", &source.to_string()).unwrap_err();
        assert!(err.to_string().contains("disagrees"));
    }
}
