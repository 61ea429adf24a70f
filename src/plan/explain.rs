//! Offline explain mode: what would run, in what shape, with what SQL.

use super::{CompiledCheck, ExecutionPlan};
use crate::checks::CheckKind;
use serde::Serialize;

/// An explanation of a single plan node. Produced without consulting the
/// query engine.
#[derive(Debug, Clone, Serialize)]
pub struct RuleExplanation {
    pub rule_id: String,
    /// One of `query`, `composite`, `reference`, `skip`
    pub node_type: &'static str,
    pub check_kind: CheckKind,
    /// Generator name for leaf kinds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generator_name: Option<&'static str>,
    pub must_satisfy: String,
    /// Ordered child ids for composites; the target for references
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<String>,
    /// The compiled SQL for leaf checks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
}

/// Yields one explanation per plan node, alphabetically by rule id.
///
/// The iteration is deterministic and repeatable: explaining the same plan
/// twice yields identical output.
pub fn explain(plan: &ExecutionPlan) -> impl Iterator<Item = RuleExplanation> + '_ {
    let mut nodes: Vec<_> = plan.iter_nodes().collect();
    nodes.sort_by(|a, b| a.rule_id.cmp(&b.rule_id));
    nodes.into_iter().map(|node| {
        let (node_type, children, sql) = match &node.check {
            CompiledCheck::Query { sql, .. } => ("query", Vec::new(), Some(sql.clone())),
            CompiledCheck::Composite { children, .. } => ("composite", children.clone(), None),
            CompiledCheck::Reference { target } => ("reference", vec![target.clone()], None),
            CompiledCheck::Skip { .. } => ("skip", Vec::new(), None),
        };
        RuleExplanation {
            rule_id: node.rule_id.clone(),
            node_type,
            check_kind: node.kind,
            generator_name: node.kind.generator().map(|g| g.name),
            must_satisfy: node.must_satisfy.clone(),
            children,
            sql,
        }
    })
}
