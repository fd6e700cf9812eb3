//! Structural validation of compiled graphs
//!
//! Three checks run in order: unique node keys, edges that point at existing
//! nodes, and acyclicity. Every violation found is reported.

use crate::error::{CoreError, CoreResult};
use crate::graph::{Edge, TenantGraph};
use crate::key::NodeKey;
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use std::collections::HashMap;
use thiserror::Error;

/// One structural defect in a graph
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphViolation {
    #[error("node key '{key}' appears {count} times")]
    DuplicateKey { key: NodeKey, count: usize },

    #[error("edge {edge} references missing node '{missing}'")]
    DanglingEdge { edge: Edge, missing: NodeKey },

    #[error("cycle detected: {}", format_path(.path))]
    Cycle { path: Vec<NodeKey> },
}

fn format_path(path: &[NodeKey]) -> String {
    path.iter()
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Outcome of validating one graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub tenant: String,
    pub violations: Vec<GraphViolation>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn into_result(self) -> CoreResult<()> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(CoreError::GraphValidation {
                tenant: self.tenant,
                violations: self.violations,
            })
        }
    }
}

/// Check a graph for duplicate keys, dangling edges and cycles
pub fn validate(graph: &TenantGraph) -> ValidationResult {
    let mut violations = Vec::new();

    let mut counts: HashMap<&NodeKey, usize> = HashMap::new();
    let mut first_seen = Vec::new();
    for node in graph.nodes() {
        let count = counts.entry(node.key()).or_insert(0);
        if *count == 0 {
            first_seen.push(node.key());
        }
        *count += 1;
    }
    for key in first_seen {
        let count = counts[key];
        if count > 1 {
            violations.push(GraphViolation::DuplicateKey {
                key: key.clone(),
                count,
            });
        }
    }

    for edge in graph.edges() {
        for endpoint in [&edge.upstream, &edge.downstream] {
            if !graph.contains(endpoint) {
                violations.push(GraphViolation::DanglingEdge {
                    edge: edge.clone(),
                    missing: endpoint.clone(),
                });
            }
        }
    }

    violations.extend(
        find_cycles(graph)
            .into_iter()
            .map(|path| GraphViolation::Cycle { path }),
    );

    log::debug!(
        "Validated graph for tenant '{}': {} node(s), {} edge(s), {} violation(s)",
        graph.tenant(),
        graph.nodes().len(),
        graph.edges().len(),
        violations.len()
    );

    ValidationResult {
        tenant: graph.tenant().to_string(),
        violations,
    }
}

/// Every cycle closed by a back edge of a depth-first search.
///
/// Each path runs from the repeated key through the recursion stack and ends
/// with the repeated key again. Roots are visited in node order and neighbours
/// in edge order, so the result is deterministic. Dangling edges are skipped.
pub(crate) fn find_cycles(graph: &TenantGraph) -> Vec<Vec<NodeKey>> {
    let mut positions: HashMap<&NodeKey, usize> = HashMap::new();
    let mut keys: Vec<&NodeKey> = Vec::new();
    for node in graph.nodes() {
        positions.entry(node.key()).or_insert_with(|| {
            keys.push(node.key());
            keys.len() - 1
        });
    }

    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); keys.len()];
    let mut dag: DiGraph<(), ()> = DiGraph::with_capacity(keys.len(), graph.edges().len());
    let handles: Vec<_> = keys.iter().map(|_| dag.add_node(())).collect();
    for edge in graph.edges() {
        if let (Some(&from), Some(&to)) = (positions.get(&edge.upstream), positions.get(&edge.downstream)) {
            adjacency[from].push(to);
            dag.add_edge(handles[from], handles[to], ());
        }
    }

    // Acyclic graphs (the common case) need no path reconstruction.
    if toposort(&dag, None).is_ok() {
        return Vec::new();
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        OnStack,
        Done,
    }

    let mut marks = vec![Mark::Unvisited; keys.len()];
    let mut cycles = Vec::new();
    for root in 0..keys.len() {
        if marks[root] != Mark::Unvisited {
            continue;
        }
        // (node, index of the next neighbour to explore)
        let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
        marks[root] = Mark::OnStack;

        while let Some(top) = stack.last_mut() {
            let node = top.0;
            if let Some(&target) = adjacency[node].get(top.1) {
                top.1 += 1;
                match marks[target] {
                    Mark::Unvisited => {
                        marks[target] = Mark::OnStack;
                        stack.push((target, 0));
                    }
                    Mark::OnStack => {
                        let start = stack
                            .iter()
                            .position(|&(n, _)| n == target)
                            .unwrap_or(0);
                        let mut path: Vec<NodeKey> =
                            stack[start..].iter().map(|&(n, _)| keys[n].clone()).collect();
                        path.push(keys[target].clone());
                        cycles.push(path);
                    }
                    Mark::Done => {}
                }
            } else {
                marks[node] = Mark::Done;
                stack.pop();
            }
        }
    }
    cycles
}

#[cfg(test)]
#[path = "validate_test.rs"]
mod tests;
