//! Compiled tenant graphs
//!
//! A [`TenantGraph`] is assembled through a [`GraphBuilder`] and is immutable
//! afterwards. Recompiling produces a new graph; nothing patches an existing one.

use crate::error::{CoreError, CoreResult};
use crate::identifier::TenantId;
use crate::key::{NodeKey, StageKind};
use crate::spec::TrinoOutput;
use crate::validate::{find_cycles, GraphViolation};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// How a SQL model is materialized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Materialization {
    View,
    Table,
}

impl std::fmt::Display for Materialization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Materialization::View => f.write_str("view"),
            Materialization::Table => f.write_str("table"),
        }
    }
}

/// Kind-specific node payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeMetadata {
    Extract {
        source_table: String,
        partitioned: bool,
        date_column: Option<String>,
        query: String,
    },
    Transfer {
        partitioned: bool,
        /// Pipelines whose extract output feeds this stage
        inputs: Vec<String>,
    },
    Load {
        source_table: String,
        partitioned: bool,
        save_to_s3: bool,
        /// Present only when the Trino sink is enabled
        trino: Option<TrinoOutput>,
    },
    #[serde(rename = "dbt")]
    SqlModel { materialization: Materialization },
}

impl NodeMetadata {
    pub fn kind(&self) -> StageKind {
        match self {
            NodeMetadata::Extract { .. } => StageKind::Extract,
            NodeMetadata::Transfer { .. } => StageKind::Transfer,
            NodeMetadata::Load { .. } => StageKind::Load,
            NodeMetadata::SqlModel { .. } => StageKind::SqlModel,
        }
    }
}

/// One executable unit of work
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    key: NodeKey,
    tenant: TenantId,
    /// Owning pipeline; empty for SQL-model nodes
    pipeline: String,
    #[serde(flatten)]
    metadata: NodeMetadata,
}

impl Node {
    /// Create a node; the owning tenant is taken from the key.
    pub fn new(key: NodeKey, pipeline: impl Into<String>, metadata: NodeMetadata) -> Self {
        Self {
            tenant: key.tenant().clone(),
            key,
            pipeline: pipeline.into(),
            metadata,
        }
    }

    pub fn key(&self) -> &NodeKey {
        &self.key
    }

    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    pub fn pipeline(&self) -> &str {
        &self.pipeline
    }

    pub fn metadata(&self) -> &NodeMetadata {
        &self.metadata
    }

    pub fn kind(&self) -> StageKind {
        self.metadata.kind()
    }
}

/// Directed dependency: `downstream` may run only after `upstream`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    pub upstream: NodeKey,
    pub downstream: NodeKey,
}

impl Edge {
    pub fn new(upstream: NodeKey, downstream: NodeKey) -> Self {
        Self {
            upstream,
            downstream,
        }
    }
}

impl std::fmt::Display for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.upstream, self.downstream)
    }
}

/// Accumulates nodes and edges for one tenant graph
#[derive(Debug)]
pub struct GraphBuilder {
    tenant: TenantId,
    environment: String,
    tags: BTreeMap<String, String>,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

impl GraphBuilder {
    pub fn new(tenant: TenantId, environment: impl Into<String>) -> Self {
        Self {
            tenant,
            environment: environment.into(),
            tags: BTreeMap::new(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn with_tags(mut self, tags: BTreeMap<String, String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn add_node(&mut self, node: Node) -> &NodeKey {
        self.nodes.push(node);
        let last = self.nodes.len() - 1;
        &self.nodes[last].key
    }

    pub fn add_edge(&mut self, upstream: NodeKey, downstream: NodeKey) {
        self.edges.push(Edge::new(upstream, downstream));
    }

    /// Append a batch of nodes and edges, keeping their order
    pub fn extend(&mut self, nodes: impl IntoIterator<Item = Node>, edges: impl IntoIterator<Item = Edge>) {
        self.nodes.extend(nodes);
        self.edges.extend(edges);
    }

    /// Finish the graph. The result is not validated; see [`crate::validate`].
    pub fn build(self) -> TenantGraph {
        let mut index = HashMap::with_capacity(self.nodes.len());
        for (i, node) in self.nodes.iter().enumerate() {
            index.entry(node.key.clone()).or_insert(i);
        }
        TenantGraph {
            tenant: self.tenant,
            environment: self.environment,
            tags: self.tags,
            nodes: self.nodes,
            edges: self.edges,
            index,
        }
    }
}

/// The compiled dependency graph of one tenant for one environment
#[derive(Debug, Clone, Serialize)]
pub struct TenantGraph {
    tenant: TenantId,
    environment: String,
    tags: BTreeMap<String, String>,
    nodes: Vec<Node>,
    edges: Vec<Edge>,

    /// Key -> position of its first occurrence in `nodes`
    #[serde(skip)]
    index: HashMap<NodeKey, usize>,
}

impl PartialEq for TenantGraph {
    fn eq(&self, other: &Self) -> bool {
        self.tenant == other.tenant
            && self.environment == other.environment
            && self.tags == other.tags
            && self.nodes == other.nodes
            && self.edges == other.edges
    }
}

impl TenantGraph {
    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    /// Nodes in construction order
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Edges in construction order
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, key: &NodeKey) -> Option<&Node> {
        self.index.get(key).map(|&i| &self.nodes[i])
    }

    pub fn contains(&self, key: &NodeKey) -> bool {
        self.index.contains_key(key)
    }

    /// Nodes of one kind, in construction order
    pub fn nodes_of_kind(&self, kind: StageKind) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(move |n| n.kind() == kind)
    }

    /// Distinct node keys
    pub fn node_keys(&self) -> BTreeSet<NodeKey> {
        self.nodes.iter().map(|n| n.key.clone()).collect()
    }

    /// Distinct `(upstream, downstream)` pairs
    pub fn edge_set(&self) -> BTreeSet<(NodeKey, NodeKey)> {
        self.edges
            .iter()
            .map(|e| (e.upstream.clone(), e.downstream.clone()))
            .collect()
    }

    /// Direct upstream neighbours of a node
    pub fn upstream(&self, key: &NodeKey) -> Vec<&NodeKey> {
        self.edges
            .iter()
            .filter(|e| &e.downstream == key)
            .map(|e| &e.upstream)
            .collect()
    }

    /// Direct downstream neighbours of a node
    pub fn downstream(&self, key: &NodeKey) -> Vec<&NodeKey> {
        self.edges
            .iter()
            .filter(|e| &e.upstream == key)
            .map(|e| &e.downstream)
            .collect()
    }

    /// Node keys with every upstream before its downstreams.
    ///
    /// Edges pointing at missing nodes are ignored; a cycle is an error.
    pub fn topological_order(&self) -> CoreResult<Vec<NodeKey>> {
        let mut graph: DiGraph<&NodeKey, ()> = DiGraph::new();
        let mut indices: HashMap<&NodeKey, NodeIndex> = HashMap::new();
        for node in &self.nodes {
            indices
                .entry(&node.key)
                .or_insert_with(|| graph.add_node(&node.key));
        }
        for edge in &self.edges {
            if let (Some(&from), Some(&to)) = (indices.get(&edge.upstream), indices.get(&edge.downstream)) {
                graph.add_edge(from, to, ());
            }
        }

        match toposort(&graph, None) {
            Ok(order) => Ok(order.into_iter().map(|idx| graph[idx].clone()).collect()),
            Err(_) => Err(CoreError::GraphValidation {
                tenant: self.tenant.to_string(),
                violations: find_cycles(self)
                    .into_iter()
                    .map(|path| GraphViolation::Cycle { path })
                    .collect(),
            }),
        }
    }

    /// SHA-256 over the sorted node and edge listing.
    ///
    /// Equal for any two graphs with the same nodes (including metadata) and
    /// edges, regardless of construction order.
    pub fn fingerprint(&self) -> String {
        let mut lines: Vec<String> = self
            .nodes
            .iter()
            .map(|n| {
                let metadata = serde_json::to_string(&n.metadata).unwrap_or_default();
                format!("node {} {} {}", n.key, n.pipeline, metadata)
            })
            .collect();
        lines.sort();
        let mut edge_lines: Vec<String> = self.edges.iter().map(|e| format!("edge {e}")).collect();
        edge_lines.sort();
        lines.extend(edge_lines);

        let mut hasher = Sha256::new();
        for line in &lines {
            hasher.update(line.as_bytes());
            hasher.update(b"\n");
        }
        format!("{:x}", hasher.finalize())
    }

    /// Pretty JSON for the execution engine
    pub fn to_json(&self) -> CoreResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
#[path = "graph_test.rs"]
mod tests;
