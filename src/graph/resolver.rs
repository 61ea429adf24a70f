//! Dependency resolution: seed selection, transitive closure, edge
//! extraction, and composite condition propagation.

use super::cycles;
use super::{DependencyGraph, EdgeKind, GraphNode};
use crate::catalog::rule::{CompositeLogic, Requirement, Rule};
use crate::catalog::RuleCatalog;
use crate::checks::CheckKind;
use crate::error::{FocusError, Result};
use std::collections::BTreeSet;
use tracing::{debug, instrument};

/// Resolves the dependency graph for a run.
///
/// The seed set is every rule whose id starts with `target_prefix` (or all
/// rules when no prefix is given); the closure then pulls in every rule
/// transitively referenced from the seeds, regardless of prefix. The
/// returned graph has composite row conditions propagated and is guaranteed
/// acyclic.
#[instrument(skip(catalog), fields(catalog.version = %catalog.version(), catalog.rules = catalog.len()))]
pub fn resolve(catalog: &RuleCatalog, target_prefix: Option<&str>) -> Result<DependencyGraph> {
    let mut builder = GraphBuilder {
        catalog,
        graph: DependencyGraph::default(),
    };

    let seeds: Vec<&Rule> = catalog
        .rules()
        .filter(|rule| {
            target_prefix
                .map(|prefix| rule.rule_id.starts_with(prefix))
                .unwrap_or(true)
        })
        .collect();

    for rule in seeds {
        builder.visit(&rule.rule_id)?;
    }

    let mut graph = builder.graph;
    propagate_composite_conditions(&mut graph);
    cycles::check_acyclic(&graph)?;

    debug!(
        graph.nodes = graph.len(),
        graph.edges = graph.edges().len(),
        "Resolved dependency graph"
    );
    Ok(graph)
}

struct GraphBuilder<'a> {
    catalog: &'a RuleCatalog,
    graph: DependencyGraph,
}

impl GraphBuilder<'_> {
    /// Adds a catalog rule (and its transitive dependencies) to the graph.
    fn visit(&mut self, rule_id: &str) -> Result<()> {
        if self.graph.nodes.contains_key(rule_id) {
            return Ok(());
        }
        let rule = self
            .catalog
            .get(rule_id)
            .ok_or_else(|| FocusError::DanglingReference {
                rule_id: rule_id.to_string(),
                target: rule_id.to_string(),
            })?
            .clone();
        self.insert_node(rule, false)
    }

    fn insert_node(&mut self, rule: Rule, synthetic: bool) -> Result<()> {
        let rule_id = rule.rule_id.clone();
        let requirement = rule.validation_criteria.clone();
        self.graph.nodes.insert(
            rule_id.clone(),
            GraphNode {
                rule,
                synthetic,
                child_ids: Vec::new(),
                inherited: Vec::new(),
            },
        );
        self.expand(&rule_id, &requirement)
    }

    /// Walks a node's requirement and emits its outgoing edges, preserving
    /// the child order given in the catalog.
    fn expand(&mut self, rule_id: &str, requirement: &Requirement) -> Result<()> {
        match requirement {
            Requirement::Leaf { .. } => Ok(()),
            Requirement::Ref { target } => {
                self.visit_reference(rule_id, target)?;
                self.graph.add_edge(rule_id, target, EdgeKind::RuleRef, 0);
                self.push_child(rule_id, target);
                Ok(())
            }
            Requirement::And { all_of } => {
                self.expand_composite(rule_id, CompositeLogic::And, all_of)
            }
            Requirement::Or { any_of } => {
                self.expand_composite(rule_id, CompositeLogic::Or, any_of)
            }
        }
    }

    fn expand_composite(
        &mut self,
        rule_id: &str,
        logic: CompositeLogic,
        items: &[Requirement],
    ) -> Result<()> {
        for (position, item) in items.iter().enumerate() {
            let child_id = match item {
                Requirement::Ref { target } => {
                    self.visit_reference(rule_id, target)?;
                    target.clone()
                }
                inline => {
                    let child_id = format!("{rule_id}#{position}");
                    let child_rule = self.synthesize_rule(rule_id, &child_id, inline)?;
                    self.insert_node(child_rule, true)?;
                    child_id
                }
            };
            self.graph
                .add_edge(rule_id, &child_id, EdgeKind::CompositeChild { logic }, position);
            self.push_child(rule_id, &child_id);
        }
        Ok(())
    }

    fn visit_reference(&mut self, rule_id: &str, target: &str) -> Result<()> {
        if self.catalog.get(target).is_none() && !self.graph.nodes.contains_key(target) {
            return Err(FocusError::DanglingReference {
                rule_id: rule_id.to_string(),
                target: target.to_string(),
            });
        }
        if self.catalog.get(target).is_some() {
            self.visit(target)?;
        }
        Ok(())
    }

    /// Materializes an inline requirement item as a rule of its own. The
    /// synthesized id is the parent id plus the item position, which keeps
    /// node identity stable across runs.
    fn synthesize_rule(&self, parent_id: &str, child_id: &str, item: &Requirement) -> Result<Rule> {
        let parent = self
            .graph
            .nodes
            .get(parent_id)
            .ok_or_else(|| FocusError::internal(format!("parent node '{parent_id}' missing")))?;
        let check_type = match item {
            Requirement::Leaf { check, .. } => *check,
            Requirement::And { .. } => CheckKind::CompositeAnd,
            Requirement::Or { .. } => CheckKind::CompositeOr,
            Requirement::Ref { .. } => CheckKind::ModelRuleReference,
        };
        Ok(Rule {
            rule_id: child_id.to_string(),
            column_id: parent.rule.column_id.clone(),
            check_type,
            validation_criteria: item.clone(),
            applicability_criteria: BTreeSet::new(),
            row_condition: None,
            must_satisfy: parent.rule.must_satisfy.clone(),
            status: parent.rule.status,
            is_dynamic: false,
        })
    }

    fn push_child(&mut self, rule_id: &str, child_id: &str) {
        if let Some(node) = self.graph.nodes.get_mut(rule_id) {
            node.child_ids.push(child_id.to_string());
        }
    }
}

/// Conjoins each AND-composite's row condition into every descendant
/// reachable through chains of AND composites. OR composites are
/// boundaries: conditions neither start from them nor cross them.
fn propagate_composite_conditions(graph: &mut DependencyGraph) {
    let sources: Vec<(String, String)> = graph
        .nodes
        .iter()
        .filter_map(|(id, node)| {
            let condition = node.rule.row_condition.clone()?;
            (node.rule.combiner() == Some(CompositeLogic::And))
                .then(|| (id.clone(), condition))
        })
        .collect();

    for (source_id, condition) in sources {
        let mut stack: Vec<String> = graph.children_of(&source_id).to_vec();
        let mut visited: BTreeSet<String> = BTreeSet::new();
        while let Some(current) = stack.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            let descend = {
                let Some(node) = graph.nodes.get_mut(&current) else {
                    continue;
                };
                if !node.inherited.contains(&condition) {
                    node.inherited.push(condition.clone());
                }
                node.rule.combiner() == Some(CompositeLogic::And)
            };
            if descend {
                stack.extend(graph.children_of(&current).iter().cloned());
            }
        }
    }
}
