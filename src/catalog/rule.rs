//! Typed rule entities for the FOCUS conformance catalog.

use crate::checks::CheckKind;
use crate::error::{FocusError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::BTreeSet;

/// Lifecycle status of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStatus {
    /// The rule participates in validation runs.
    #[default]
    Active,
    /// The rule is loaded but skipped unless the run opts in.
    Draft,
}

/// Combiner for composite rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompositeLogic {
    /// All children must hold.
    And,
    /// At least one child must hold.
    Or,
}

impl CompositeLogic {
    /// Returns "AND" or "OR" for diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

/// Parameters for a leaf check, frozen after catalog load.
///
/// Keys are ordered so that generated SQL is byte-identical across runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckParams(BTreeMap<String, serde_json::Value>);

impl CheckParams {
    /// Creates an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the raw JSON value for a key.
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    /// Returns true if the key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Inserts a value. Only the loader calls this while merging defaults;
    /// parameters are immutable afterwards.
    pub(crate) fn insert(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.0.insert(key.into(), value);
    }

    /// Returns a required string parameter.
    pub fn str(&self, key: &str) -> Result<&str> {
        self.get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| FocusError::Internal(format!("parameter '{key}' is not a string")))
    }

    /// Returns a required list-of-strings parameter.
    pub fn str_list(&self, key: &str) -> Result<Vec<&str>> {
        let values = self
            .get(key)
            .and_then(|v| v.as_array())
            .ok_or_else(|| FocusError::Internal(format!("parameter '{key}' is not a list")))?;
        values
            .iter()
            .map(|v| {
                v.as_str().ok_or_else(|| {
                    FocusError::Internal(format!("parameter '{key}' contains a non-string entry"))
                })
            })
            .collect()
    }

    /// Iterates parameters in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &serde_json::Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<(String, serde_json::Value)> for CheckParams {
    fn from_iter<I: IntoIterator<Item = (String, serde_json::Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// The validation requirement carried by a rule.
///
/// Leaves carry parameters for their check kind; composites carry an
/// ordered list of child requirements; references point at another rule
/// by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Requirement {
    /// AND composite: every child requirement must hold.
    And {
        all_of: Vec<Requirement>,
    },
    /// OR composite: at least one child requirement must hold.
    Or {
        any_of: Vec<Requirement>,
    },
    /// Reference to another rule's outcome.
    Ref {
        #[serde(rename = "ref")]
        target: String,
    },
    /// Concrete check with parameters.
    Leaf {
        check: CheckKind,
        #[serde(default)]
        params: CheckParams,
    },
}

impl Requirement {
    /// Returns the composite combiner, if this requirement is a composite.
    pub fn logic(&self) -> Option<CompositeLogic> {
        match self {
            Self::And { .. } => Some(CompositeLogic::And),
            Self::Or { .. } => Some(CompositeLogic::Or),
            _ => None,
        }
    }

    /// Returns the ordered children of a composite requirement.
    pub fn children(&self) -> Option<&[Requirement]> {
        match self {
            Self::And { all_of } => Some(all_of),
            Self::Or { any_of } => Some(any_of),
            _ => None,
        }
    }

    /// Collects every rule id referenced anywhere inside this requirement.
    pub fn referenced_rule_ids(&self) -> Vec<&str> {
        let mut ids = Vec::new();
        self.collect_refs(&mut ids);
        ids
    }

    fn collect_refs<'a>(&'a self, ids: &mut Vec<&'a str>) {
        match self {
            Self::Ref { target } => ids.push(target),
            Self::And { all_of } => all_of.iter().for_each(|r| r.collect_refs(ids)),
            Self::Or { any_of } => any_of.iter().for_each(|r| r.collect_refs(ids)),
            Self::Leaf { .. } => {}
        }
    }
}

/// A single conformance rule. Immutable after catalog load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    /// Stable textual identifier, unique within a catalog version
    pub rule_id: String,
    /// The FOCUS column this rule pertains to, when column-scoped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_id: Option<String>,
    /// The check kind driving SQL generation (or composition)
    pub check_type: CheckKind,
    /// The requirement tree
    pub validation_criteria: Requirement,
    /// Applicability tokens gating this rule
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub applicability_criteria: BTreeSet<String>,
    /// SQL boolean fragment restricting the rows this rule evaluates over
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_condition: Option<String>,
    /// Human-readable requirement text, used only for diagnostics
    pub must_satisfy: String,
    /// Lifecycle status
    #[serde(default)]
    pub status: RuleStatus,
    /// Whether the rule requires inspecting data content to decide if it
    /// applies at all; such rules are skipped
    #[serde(default)]
    pub is_dynamic: bool,
}

impl Rule {
    /// Returns the composite combiner when this rule is a composite.
    pub fn combiner(&self) -> Option<CompositeLogic> {
        match self.check_type {
            CheckKind::CompositeAnd => Some(CompositeLogic::And),
            CheckKind::CompositeOr => Some(CompositeLogic::Or),
            _ => None,
        }
    }

    /// Returns true for `composite_and` / `composite_or` rules.
    pub fn is_composite(&self) -> bool {
        self.combiner().is_some()
    }

    /// Returns true for `model_rule_reference` rules.
    pub fn is_reference(&self) -> bool {
        self.check_type == CheckKind::ModelRuleReference
    }

    /// Returns true for rules whose check is a concrete SQL predicate.
    pub fn is_leaf(&self) -> bool {
        !self.is_composite() && !self.is_reference()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requirement_json_shapes() {
        let leaf: Requirement = serde_json::from_value(serde_json::json!({
            "check": "type_string",
            "params": {"column": "AvailabilityZone"}
        }))
        .unwrap();
        assert!(matches!(leaf, Requirement::Leaf { .. }));

        let composite: Requirement = serde_json::from_value(serde_json::json!({
            "all_of": [
                {"ref": "BilledCost-C-001-M"},
                {"check": "value_not_null", "params": {"column": "BilledCost"}}
            ]
        }))
        .unwrap();
        assert_eq!(composite.logic(), Some(CompositeLogic::And));
        assert_eq!(composite.children().unwrap().len(), 2);
        assert_eq!(composite.referenced_rule_ids(), vec!["BilledCost-C-001-M"]);

        let reference: Requirement =
            serde_json::from_value(serde_json::json!({"ref": "RegionId-C-001-M"})).unwrap();
        assert!(matches!(reference, Requirement::Ref { .. }));
    }

    #[test]
    fn test_nested_refs_collected() {
        let requirement: Requirement = serde_json::from_value(serde_json::json!({
            "any_of": [
                {"all_of": [{"ref": "A"}, {"ref": "B"}]},
                {"ref": "C"}
            ]
        }))
        .unwrap();
        assert_eq!(requirement.referenced_rule_ids(), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_params_accessors() {
        let mut params = CheckParams::new();
        params.insert("column", serde_json::json!("BilledCost"));
        params.insert("values", serde_json::json!(["USD", "EUR"]));
        assert_eq!(params.str("column").unwrap(), "BilledCost");
        assert_eq!(params.str_list("values").unwrap(), vec!["USD", "EUR"]);
        assert!(params.str("missing").is_err());
    }

    #[test]
    fn test_rule_classification() {
        let rule: Rule = serde_json::from_value(serde_json::json!({
            "rule_id": "BilledCost-C-000-M",
            "check_type": "composite_and",
            "validation_criteria": {"all_of": [{"ref": "BilledCost-C-001-M"}]},
            "must_satisfy": "All BilledCost constraints hold."
        }))
        .unwrap();
        assert!(rule.is_composite());
        assert_eq!(rule.combiner(), Some(CompositeLogic::And));
        assert_eq!(rule.status, RuleStatus::Active);
        assert!(!rule.is_dynamic);
    }
}
