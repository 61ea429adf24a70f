//! Cycle detection over the dependency graph.
//!
//! Strongly connected components are found with Tarjan's algorithm; any
//! component of size greater than one, or any self-loop, fails resolution.
//! The error carries one concrete shortest cycle plus a Graphviz dump of
//! the offending component.

use super::DependencyGraph;
use crate::error::{FocusError, Result};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Verifies that the graph is acyclic, reporting the first non-trivial
/// strongly connected component otherwise.
pub fn check_acyclic(graph: &DependencyGraph) -> Result<()> {
    for scc in tarjan_sccs(graph) {
        let is_self_loop = scc.len() == 1
            && graph
                .children_of(&scc[0])
                .iter()
                .any(|child| child == &scc[0]);
        if scc.len() > 1 || is_self_loop {
            let cycle = shortest_cycle(graph, &scc);
            let dot = dot_dump(graph, &scc);
            return Err(FocusError::CycleDetected { cycle, dot });
        }
    }
    Ok(())
}

struct TarjanState<'a> {
    graph: &'a DependencyGraph,
    index: usize,
    indices: BTreeMap<&'a str, usize>,
    lowlinks: BTreeMap<&'a str, usize>,
    on_stack: BTreeSet<&'a str>,
    stack: Vec<&'a str>,
    sccs: Vec<Vec<String>>,
}

/// Computes strongly connected components in O(V + E).
fn tarjan_sccs(graph: &DependencyGraph) -> Vec<Vec<String>> {
    let mut state = TarjanState {
        graph,
        index: 0,
        indices: BTreeMap::new(),
        lowlinks: BTreeMap::new(),
        on_stack: BTreeSet::new(),
        stack: Vec::new(),
        sccs: Vec::new(),
    };
    for id in graph.node_ids() {
        if !state.indices.contains_key(id) {
            strong_connect(&mut state, id);
        }
    }
    state.sccs
}

fn strong_connect<'a>(state: &mut TarjanState<'a>, node: &'a str) {
    state.indices.insert(node, state.index);
    state.lowlinks.insert(node, state.index);
    state.index += 1;
    state.stack.push(node);
    state.on_stack.insert(node);

    let graph = state.graph;
    for child in graph.children_of(node) {
        let child = child.as_str();
        // Edges may name nodes pruned from the graph; skip them.
        if graph.node(child).is_none() {
            continue;
        }
        if !state.indices.contains_key(child) {
            strong_connect(state, child);
            let low = state.lowlinks[node].min(state.lowlinks[child]);
            state.lowlinks.insert(node, low);
        } else if state.on_stack.contains(child) {
            let low = state.lowlinks[node].min(state.indices[child]);
            state.lowlinks.insert(node, low);
        }
    }

    if state.lowlinks[node] == state.indices[node] {
        let mut component = Vec::new();
        while let Some(member) = state.stack.pop() {
            state.on_stack.remove(member);
            component.push(member.to_string());
            if member == node {
                break;
            }
        }
        component.sort();
        state.sccs.push(component);
    }
}

/// Finds one shortest cycle inside a strongly connected component by BFS
/// from its lexicographically smallest member. The returned path starts
/// and ends at that member, e.g. `[A, B, A]`.
fn shortest_cycle(graph: &DependencyGraph, scc: &[String]) -> Vec<String> {
    let members: BTreeSet<&str> = scc.iter().map(String::as_str).collect();
    let start = match scc.first() {
        Some(start) => start.as_str(),
        None => return Vec::new(),
    };

    if graph.children_of(start).iter().any(|c| c == start) {
        return vec![start.to_string(), start.to_string()];
    }

    let mut predecessor: BTreeMap<&str, &str> = BTreeMap::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    queue.push_back(start);
    while let Some(current) = queue.pop_front() {
        for child in graph.children_of(current) {
            let child = child.as_str();
            if !members.contains(child) {
                continue;
            }
            if child == start {
                let mut path = vec![start.to_string()];
                let mut cursor = current;
                let mut tail = Vec::new();
                while cursor != start {
                    tail.push(cursor.to_string());
                    cursor = predecessor[cursor];
                }
                tail.reverse();
                path.extend(tail);
                path.push(start.to_string());
                return path;
            }
            if !predecessor.contains_key(child) {
                predecessor.insert(child, current);
                queue.push_back(child);
            }
        }
    }
    scc.to_vec()
}

/// Renders the component's internal edges as a Graphviz digraph.
fn dot_dump(graph: &DependencyGraph, scc: &[String]) -> String {
    let members: BTreeSet<&str> = scc.iter().map(String::as_str).collect();
    let mut out = String::from("digraph dependency_cycle {\n");
    for member in scc {
        for child in graph.children_of(member) {
            if members.contains(child.as_str()) {
                out.push_str(&format!("    \"{member}\" -> \"{child}\";\n"));
            }
        }
    }
    out.push('}');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::rule::{Requirement, Rule};
    use crate::checks::CheckKind;
    use crate::graph::{EdgeKind, GraphNode};

    fn reference_rule(id: &str, target: &str) -> Rule {
        Rule {
            rule_id: id.to_string(),
            column_id: None,
            check_type: CheckKind::ModelRuleReference,
            validation_criteria: Requirement::Ref {
                target: target.to_string(),
            },
            applicability_criteria: Default::default(),
            row_condition: None,
            must_satisfy: String::new(),
            status: Default::default(),
            is_dynamic: false,
        }
    }

    fn graph_from_edges(edges: &[(&str, &str)]) -> DependencyGraph {
        let mut graph = DependencyGraph::default();
        for (parent, child) in edges {
            for id in [parent, child] {
                graph.nodes.entry((*id).to_string()).or_insert_with(|| GraphNode {
                    rule: reference_rule(id, child),
                    synthetic: false,
                    child_ids: Vec::new(),
                    inherited: Vec::new(),
                });
            }
            graph.add_edge(parent, child, EdgeKind::RuleRef, 0);
        }
        graph
    }

    #[test]
    fn test_acyclic_graph_passes() {
        let graph = graph_from_edges(&[("A", "B"), ("B", "C"), ("A", "C")]);
        assert!(check_acyclic(&graph).is_ok());
    }

    #[test]
    fn test_two_cycle_detected() {
        let graph = graph_from_edges(&[("A", "B"), ("B", "A")]);
        let err = check_acyclic(&graph).unwrap_err();
        match err {
            FocusError::CycleDetected { cycle, dot } => {
                assert_eq!(cycle, vec!["A", "B", "A"]);
                assert!(dot.contains("\"A\" -> \"B\""));
                assert!(dot.contains("\"B\" -> \"A\""));
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_self_loop_detected() {
        let graph = graph_from_edges(&[("A", "A")]);
        let err = check_acyclic(&graph).unwrap_err();
        match err {
            FocusError::CycleDetected { cycle, .. } => {
                assert_eq!(cycle, vec!["A", "A"]);
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_shortest_cycle_in_larger_component() {
        // A -> B -> C -> A plus shortcut B -> A; shortest from A is A,B,A.
        let graph = graph_from_edges(&[("A", "B"), ("B", "C"), ("C", "A"), ("B", "A")]);
        let err = check_acyclic(&graph).unwrap_err();
        match err {
            FocusError::CycleDetected { cycle, .. } => {
                assert_eq!(cycle, vec!["A", "B", "A"]);
            }
            other => panic!("unexpected error {other}"),
        }
    }
}
