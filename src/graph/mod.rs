//! Dependency graph over conformance rules.
//!
//! Nodes are rules (catalog rules plus synthesized nodes for inline
//! composite children); edges point from a parent to the children it
//! depends on. Children always execute before their parents. Edges hold
//! rule-id keys only — the graph owns its nodes, so no cyclic ownership is
//! possible and referential integrity is checked at construction.

pub mod cycles;
pub mod resolver;

pub use resolver::resolve;

use crate::catalog::rule::{CompositeLogic, Rule};
use std::collections::BTreeMap;

/// Why an edge exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// The parent is a composite and the child is one of its requirement
    /// items; `logic` is the parent's combiner.
    CompositeChild { logic: CompositeLogic },
    /// The parent is a `model_rule_reference` pointing at the child.
    RuleRef,
}

/// A directed dependency edge `parent -> child`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEdge {
    pub parent: String,
    pub child: String,
    pub kind: EdgeKind,
    /// Position of the child within the parent's requirement item list
    pub position: usize,
}

/// A node in the dependency graph.
#[derive(Debug, Clone)]
pub struct GraphNode {
    /// The rule this node evaluates (synthesized for inline children)
    pub rule: Rule,
    /// True when the node was synthesized from an inline requirement item
    pub synthetic: bool,
    /// Ordered child ids as they appear in the requirement (duplicates kept)
    pub child_ids: Vec<String>,
    /// Row conditions inherited from AND-composite ancestors
    pub inherited: Vec<String>,
}

/// The resolved dependency graph for one validation run.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    pub(crate) nodes: BTreeMap<String, GraphNode>,
    pub(crate) children: BTreeMap<String, Vec<String>>,
    pub(crate) parents: BTreeMap<String, Vec<String>>,
    pub(crate) edges: Vec<DependencyEdge>,
}

impl DependencyGraph {
    /// Looks up a node by rule id.
    pub fn node(&self, rule_id: &str) -> Option<&GraphNode> {
        self.nodes.get(rule_id)
    }

    /// Iterates node ids in lexicographic order.
    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Iterates nodes in lexicographic id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &GraphNode)> {
        self.nodes.iter().map(|(id, node)| (id.as_str(), node))
    }

    /// Number of nodes in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true when the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Unique ordered children (dependencies) of a node.
    pub fn children_of(&self, rule_id: &str) -> &[String] {
        self.children.get(rule_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Parents (dependents) of a node, in insertion order.
    pub fn parents_of(&self, rule_id: &str) -> &[String] {
        self.parents.get(rule_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All edges in insertion order.
    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    /// Computes the in-degree map for scheduling: for each node, the number
    /// of distinct children it waits on.
    pub fn in_degrees(&self) -> BTreeMap<String, usize> {
        self.nodes
            .keys()
            .map(|id| (id.clone(), self.children_of(id).len()))
            .collect()
    }

    /// Renders the conjunction of a node's inherited row conditions, if any.
    pub fn inherited_condition(&self, rule_id: &str) -> Option<String> {
        let node = self.nodes.get(rule_id)?;
        if node.inherited.is_empty() {
            return None;
        }
        Some(
            node.inherited
                .iter()
                .map(|c| format!("({c})"))
                .collect::<Vec<_>>()
                .join(" AND "),
        )
    }

    pub(crate) fn add_edge(&mut self, parent: &str, child: &str, kind: EdgeKind, position: usize) {
        self.edges.push(DependencyEdge {
            parent: parent.to_string(),
            child: child.to_string(),
            kind,
            position,
        });
        let children = self.children.entry(parent.to_string()).or_default();
        if !children.iter().any(|c| c == child) {
            children.push(child.to_string());
        }
        let parents = self.parents.entry(child.to_string()).or_default();
        if !parents.iter().any(|p| p == parent) {
            parents.push(parent.to_string());
        }
    }
}
