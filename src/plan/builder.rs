//! Plan construction: applicability marking, layering, and compilation.

use super::{CompiledCheck, ExecutionPlan, PlanNode};
use crate::catalog::rule::{Requirement, RuleStatus};
use crate::config::{DraftPolicy, ValidatorConfig};
use crate::error::{FocusError, Result};
use crate::graph::{DependencyGraph, GraphNode};
use crate::report::OutcomeStatus;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::{debug, instrument};

/// Compiles the resolved graph into a layered execution plan.
///
/// Skipped rules (non-applicable, draft, dynamic) stay in the plan as
/// no-op nodes with a predetermined outcome so that downstream composites
/// can aggregate them.
#[instrument(skip(graph, config), fields(graph.nodes = graph.len()))]
pub fn build_plan(graph: &DependencyGraph, config: &ValidatorConfig) -> Result<ExecutionPlan> {
    let applicable = mark_applicability(graph, &config.applicability);
    let layers = layer_ids(graph)?;

    let mut compiled_layers = Vec::with_capacity(layers.len());
    for layer in layers {
        let mut nodes = Vec::with_capacity(layer.len());
        for rule_id in layer {
            let node = graph
                .node(&rule_id)
                .ok_or_else(|| FocusError::Plan(format!("node '{rule_id}' vanished")))?;
            nodes.push(compile_node(graph, config, &applicable, &rule_id, node)?);
        }
        compiled_layers.push(nodes);
    }

    let plan = ExecutionPlan::new(compiled_layers);
    debug!(
        plan.nodes = plan.len(),
        plan.layers = plan.layers().len(),
        "Compiled execution plan"
    );
    Ok(plan)
}

/// Determines which nodes participate in the run.
///
/// A node's own criteria are satisfied when empty or when at least one
/// token is asserted for the run. Applicability is hierarchical: a node
/// with parents participates only if some parent participates, so a
/// subtree gated by a non-applicable composite is skipped wholesale unless
/// reachable through another applicable parent.
fn mark_applicability(graph: &DependencyGraph, tokens: &BTreeSet<String>) -> BTreeSet<String> {
    let own_ok = |node: &GraphNode| {
        node.rule.applicability_criteria.is_empty()
            || node
                .rule
                .applicability_criteria
                .iter()
                .any(|token| tokens.contains(token))
    };

    let mut applicable: BTreeSet<String> = BTreeSet::new();
    let mut processed_parents: BTreeMap<&str, usize> = BTreeMap::new();
    let mut queue: VecDeque<&str> = graph
        .node_ids()
        .filter(|id| graph.parents_of(id).is_empty())
        .collect();

    // Roots first, then children as soon as every parent has been decided.
    let mut decided: BTreeSet<&str> = BTreeSet::new();
    while let Some(id) = queue.pop_front() {
        if !decided.insert(id) {
            continue;
        }
        let node = match graph.node(id) {
            Some(node) => node,
            None => continue,
        };
        let parents = graph.parents_of(id);
        let reachable =
            parents.is_empty() || parents.iter().any(|parent| applicable.contains(parent));
        if reachable && own_ok(node) {
            applicable.insert(id.to_string());
        }
        for child in graph.children_of(id) {
            let seen = processed_parents.entry(child.as_str()).or_insert(0);
            *seen += 1;
            if *seen == graph.parents_of(child).len() {
                queue.push_back(child.as_str());
            }
        }
    }
    applicable
}

/// Runs Kahn's algorithm over the dependency graph, emitting one layer per
/// step. Ready sets are sorted lexicographically so the schedule is
/// reproducible across platforms.
fn layer_ids(graph: &DependencyGraph) -> Result<Vec<Vec<String>>> {
    let mut in_degree = graph.in_degrees();
    let mut ready: Vec<String> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| id.clone())
        .collect();
    ready.sort();

    let mut layers: Vec<Vec<String>> = Vec::new();
    let mut emitted = 0usize;
    while !ready.is_empty() {
        let mut next: Vec<String> = Vec::new();
        for id in &ready {
            for parent in graph.parents_of(id) {
                let degree = in_degree
                    .get_mut(parent)
                    .ok_or_else(|| FocusError::Plan(format!("unknown parent '{parent}'")))?;
                *degree -= 1;
                if *degree == 0 {
                    next.push(parent.clone());
                }
            }
        }
        emitted += ready.len();
        layers.push(std::mem::take(&mut ready));
        next.sort();
        ready = next;
    }

    if emitted != graph.len() {
        let blocked: Vec<String> = in_degree
            .into_iter()
            .filter(|(_, degree)| *degree > 0)
            .map(|(id, _)| id)
            .collect();
        return Err(FocusError::Plan(format!(
            "unresolved blockers after layering (resolver bug): {}",
            blocked.join(", ")
        )));
    }
    Ok(layers)
}

fn compile_node(
    graph: &DependencyGraph,
    config: &ValidatorConfig,
    applicable: &BTreeSet<String>,
    rule_id: &str,
    node: &GraphNode,
) -> Result<PlanNode> {
    let rule = &node.rule;

    let check = if rule.status == RuleStatus::Draft && config.draft_policy == DraftPolicy::Skip {
        CompiledCheck::Skip {
            status: OutcomeStatus::SkippedNonApplicable,
            reason: "draft".to_string(),
        }
    } else if !applicable.contains(rule_id) {
        let unmet: Vec<&str> = rule
            .applicability_criteria
            .iter()
            .filter(|token| !config.applicability.contains(*token))
            .map(String::as_str)
            .collect();
        let reason = if unmet.is_empty() {
            "not reachable through an applicable parent".to_string()
        } else {
            format!("applicability criteria not satisfied: {}", unmet.join(", "))
        };
        CompiledCheck::Skip {
            status: OutcomeStatus::SkippedNonApplicable,
            reason,
        }
    } else if rule.is_dynamic {
        CompiledCheck::Skip {
            status: OutcomeStatus::SkippedDynamic,
            reason: "rule cannot be validated statically".to_string(),
        }
    } else if let Some(logic) = rule.combiner() {
        CompiledCheck::Composite {
            logic,
            children: node.child_ids.clone(),
        }
    } else if let Requirement::Ref { target } = &rule.validation_criteria {
        CompiledCheck::Reference {
            target: target.clone(),
        }
    } else {
        compile_leaf(graph, config, rule_id, node)?
    };

    Ok(PlanNode {
        rule_id: rule_id.to_string(),
        kind: rule.check_type,
        column_id: rule.column_id.clone(),
        must_satisfy: rule.must_satisfy.clone(),
        check,
    })
}

fn compile_leaf(
    graph: &DependencyGraph,
    config: &ValidatorConfig,
    rule_id: &str,
    node: &GraphNode,
) -> Result<CompiledCheck> {
    let rule = &node.rule;
    let Requirement::Leaf { check, params } = &rule.validation_criteria else {
        return Err(FocusError::Plan(format!(
            "rule '{rule_id}' classified as leaf but has no leaf requirement"
        )));
    };

    let condition = effective_condition(
        graph.inherited_condition(rule_id),
        rule.row_condition.as_deref(),
    );
    let sql = check.generate_sql(params, condition.as_deref())?;
    let sample_sql = if config.show_violations {
        check.sample_sql(params, condition.as_deref(), config.sample_limit)?
    } else {
        None
    };
    Ok(CompiledCheck::Query { sql, sample_sql })
}

/// Conjoins conditions inherited from AND-composite ancestors with the
/// rule's own row condition.
fn effective_condition(inherited: Option<String>, own: Option<&str>) -> Option<String> {
    match (inherited, own) {
        (Some(inherited), Some(own)) => Some(format!("{inherited} AND ({own})")),
        (Some(inherited), None) => Some(inherited),
        (None, Some(own)) => Some(format!("({own})")),
        (None, None) => None,
    }
}
