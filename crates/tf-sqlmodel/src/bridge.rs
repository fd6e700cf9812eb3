//! Bridging SQL models into the stage graph
//!
//! Every manifest model becomes a SQL-model node. `model:` references become
//! edges between models; `source:` references name a pipeline that feeds SQL
//! models, and become edges from that pipeline's extract node.

use crate::manifest::{ModelRef, SqlManifest};
use std::collections::BTreeSet;
use tf_core::error::{CoreError, CoreResult};
use tf_core::graph::{Edge, Node, NodeMetadata};
use tf_core::identifier::{PipelineName, TenantId};
use tf_core::key::{key_for, StageKind};

/// Pipelines whose extracted data SQL models may reference as sources.
///
/// A source is identified by the pipeline name, which is also the local name
/// of the pipeline's extract node. The physical source table plays no part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvableSources {
    pipelines: BTreeSet<PipelineName>,
}

impl ResolvableSources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pipeline as a SQL-model source; returns false if already present
    pub fn register(&mut self, pipeline: PipelineName) -> bool {
        self.pipelines.insert(pipeline)
    }

    pub fn resolve(&self, source_name: &str) -> Option<&PipelineName> {
        self.pipelines.get(source_name)
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}

/// SQL-model nodes plus their incoming edges
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlModelSubgraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

/// Build the SQL-model part of a tenant graph.
///
/// Nodes follow manifest order and edges follow reference order. A
/// `source:` reference nobody provides fails with
/// [`CoreError::UnresolvedSourceReference`]; a `model:` reference to a model
/// missing from the manifest is still emitted and left for graph validation.
pub fn build_sql_model_subgraph(
    tenant: &TenantId,
    manifest: &SqlManifest,
    sources: &ResolvableSources,
) -> CoreResult<SqlModelSubgraph> {
    let mut subgraph = SqlModelSubgraph::default();

    for model in manifest.models() {
        let model_key = key_for(tenant, StageKind::SqlModel, &model.name);
        subgraph.nodes.push(Node::new(
            model_key.clone(),
            "",
            NodeMetadata::SqlModel {
                materialization: model.materialization,
            },
        ));

        for reference in &model.refs {
            let upstream = match reference {
                ModelRef::Model(name) => key_for(tenant, StageKind::SqlModel, name),
                ModelRef::Source(name) => {
                    let pipeline = sources.resolve(name).ok_or_else(|| {
                        CoreError::UnresolvedSourceReference {
                            reference: name.clone(),
                            model: model.name.clone(),
                        }
                    })?;
                    key_for(tenant, StageKind::Extract, pipeline)
                }
            };
            log::debug!("SQL model edge {upstream} -> {model_key}");
            subgraph.edges.push(Edge::new(upstream, model_key.clone()));
        }
    }

    Ok(subgraph)
}

#[cfg(test)]
#[path = "bridge_test.rs"]
mod tests;
