//! Pipeline graph compiler
//!
//! Turns a tenant's pipelines into stage nodes, wires the edges between them,
//! merges in the SQL-model subgraph and validates the result. A graph that
//! fails validation is never returned.

use tf_core::environment::EffectivePipelineSpec;
use tf_core::error::{CoreError, CoreResult};
use tf_core::graph::{Edge, GraphBuilder, Node, NodeMetadata, TenantGraph};
use tf_core::identifier::TenantId;
use tf_core::key::{key_for, StageKind};
use tf_core::spec::TenantSpec;
use tf_core::validate::validate;
use tf_sqlmodel::{build_sql_model_subgraph, ResolvableSources, SqlManifest};

/// Nodes and edges contributed by one pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStages {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

/// Build the stages of one resolved pipeline.
///
/// Extract is always present. Transfer exists iff `has_transfer`, fed by the
/// extract stage of every transfer input. A single Load exists iff any sink is
/// enabled, fed by Transfer when present and by Extract otherwise.
pub fn compile_pipeline(tenant: &TenantId, pipeline: &EffectivePipelineSpec) -> PipelineStages {
    let mut stages = PipelineStages::default();
    let name = pipeline.name.as_str();
    let partitioned = pipeline.is_partitioned();

    let extract = key_for(tenant, StageKind::Extract, name);
    stages.nodes.push(Node::new(
        extract.clone(),
        name,
        NodeMetadata::Extract {
            source_table: pipeline.source_table.clone(),
            partitioned,
            date_column: pipeline.date_column.clone(),
            query: pipeline.extract_query(),
        },
    ));

    let mut load_source = extract;

    if pipeline.has_transfer {
        let transfer = key_for(tenant, StageKind::Transfer, name);
        stages.nodes.push(Node::new(
            transfer.clone(),
            name,
            NodeMetadata::Transfer {
                partitioned,
                inputs: pipeline.transfer_inputs.clone(),
            },
        ));
        for input in &pipeline.transfer_inputs {
            stages.edges.push(Edge::new(
                key_for(tenant, StageKind::Extract, input),
                transfer.clone(),
            ));
        }
        load_source = transfer;
    }

    if pipeline.has_load() {
        let load = key_for(tenant, StageKind::Load, name);
        stages.nodes.push(Node::new(
            load.clone(),
            name,
            NodeMetadata::Load {
                source_table: pipeline.source_table.clone(),
                partitioned,
                save_to_s3: pipeline.save_to_s3,
                trino: pipeline.trino_target().cloned(),
            },
        ));
        stages.edges.push(Edge::new(load_source, load));
    }

    stages
}

/// Compile one tenant for one environment.
///
/// Pipelines are processed in declaration order. Any pipeline failure aborts
/// the tenant with [`CoreError::PipelineCompile`]; graph validation failures
/// surface as [`CoreError::GraphValidation`].
pub fn compile(
    tenant: &TenantSpec,
    environment: &str,
    manifest: &SqlManifest,
) -> CoreResult<TenantGraph> {
    let id = tenant.id();
    let mut builder = GraphBuilder::new(id.clone(), environment).with_tags(tenant.tags().clone());
    let mut sources = ResolvableSources::new();

    for pipeline in tenant.pipelines() {
        let effective = tenant
            .resolve_pipeline(pipeline, environment)
            .map_err(|e| CoreError::from(e).in_pipeline(pipeline.name.as_str()))?;

        let stages = compile_pipeline(id, &effective);
        log::debug!(
            "Pipeline '{}/{}' ({}): {} stage(s)",
            id,
            effective.name,
            environment,
            stages.nodes.len()
        );
        builder.extend(stages.nodes, stages.edges);

        if effective.has_dbt_transform {
            sources.register(effective.name.clone());
        }
    }

    let subgraph = build_sql_model_subgraph(id, manifest, &sources)?;
    builder.extend(subgraph.nodes, subgraph.edges);

    let graph = builder.build();
    validate(&graph).into_result()?;

    log::info!(
        "Compiled tenant '{}' for '{}': {} node(s), {} edge(s)",
        id,
        environment,
        graph.nodes().len(),
        graph.edges().len()
    );
    Ok(graph)
}

#[cfg(test)]
#[path = "compiler_test.rs"]
mod tests;
