//! Environment override resolution
//!
//! [`resolve`] merges a pipeline's base fields with the override declared for
//! one environment and re-checks the cross-field rules on the merged result.
//! Rules are checked after the merge because an override may switch a sink off
//! together with its descriptor.

use crate::error::SpecValidationError;
use crate::identifier::PipelineName;
use crate::spec::{check_consistency, PipelineSpec, StageFields, TenantSpec, TrinoOutput};

/// Environment variable consulted when no environment is given explicitly
pub const ENVIRONMENT_VAR: &str = "TF_ENVIRONMENT";

/// Environment used when nothing else selects one
pub const DEFAULT_ENVIRONMENT: &str = "dev";

/// A pipeline specification with one environment's overrides applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectivePipelineSpec {
    /// Environment this spec was resolved for
    pub environment: String,
    pub name: PipelineName,
    pub source_table: String,
    pub date_column: Option<String>,
    pub query: Option<String>,
    pub has_transfer: bool,

    /// Pipelines whose extract output feeds the transfer stage; never empty
    pub transfer_inputs: Vec<String>,

    pub has_dbt_transform: bool,
    pub save_to_s3: bool,
    pub save_to_trino: bool,

    /// Descriptor as merged; only meaningful when `save_to_trino` is set
    pub trino_output: Option<TrinoOutput>,
}

impl EffectivePipelineSpec {
    pub fn is_partitioned(&self) -> bool {
        self.date_column.is_some()
    }

    /// Whether any sink is enabled, which means a load stage exists
    pub fn has_load(&self) -> bool {
        self.save_to_s3 || self.save_to_trino
    }

    /// The Trino target, if the Trino sink is enabled
    pub fn trino_target(&self) -> Option<&TrinoOutput> {
        if self.save_to_trino {
            self.trino_output.as_ref()
        } else {
            None
        }
    }

    /// The extract query: the custom query, or a full scan of the source table
    pub fn extract_query(&self) -> String {
        match &self.query {
            Some(query) => query.clone(),
            None => format!("SELECT * FROM {}", self.source_table),
        }
    }
}

/// Merge `pipeline` with the override declared for `environment`.
///
/// An environment without an override resolves to the base spec. The returned
/// error's `tenant` is empty; [`TenantSpec::resolve_pipeline`] fills it in.
pub fn resolve(
    pipeline: &PipelineSpec,
    environment: &str,
) -> Result<EffectivePipelineSpec, SpecValidationError> {
    let mut merged = EffectivePipelineSpec {
        environment: environment.to_string(),
        name: pipeline.name.clone(),
        source_table: pipeline.source_table.clone(),
        date_column: pipeline.date_column.clone(),
        query: pipeline.query.clone(),
        has_transfer: pipeline.has_transfer,
        transfer_inputs: Vec::new(),
        has_dbt_transform: pipeline.has_dbt_transform,
        save_to_s3: pipeline.save_to_s3,
        save_to_trino: pipeline.save_to_trino,
        trino_output: pipeline.trino_output.clone(),
    };
    let mut partitioned = pipeline.partitioned;
    let mut transfer_inputs = pipeline.transfer_inputs.clone();

    if let Some(o) = pipeline.override_for(environment) {
        if let Some(v) = &o.source_table {
            merged.source_table = v.clone();
        }
        if let Some(v) = &o.date_column {
            merged.date_column = v.clone();
        }
        if let Some(v) = o.partitioned {
            partitioned = v;
        }
        if let Some(v) = &o.query {
            merged.query = v.clone();
        }
        if let Some(v) = o.has_transfer {
            merged.has_transfer = v;
        }
        if let Some(v) = &o.transfer_inputs {
            transfer_inputs = v.clone();
        }
        if let Some(v) = o.has_dbt_transform {
            merged.has_dbt_transform = v;
        }
        if let Some(v) = o.save_to_s3 {
            merged.save_to_s3 = v;
        }
        if let Some(v) = o.save_to_trino {
            merged.save_to_trino = v;
        }
        if let Some(v) = &o.trino_output {
            merged.trino_output = v.clone();
        }
    }

    let mut issues = Vec::new();
    check_consistency(
        &pipeline.name,
        Some(environment),
        &StageFields {
            source_table: &merged.source_table,
            date_column: merged.date_column.as_deref(),
            partitioned,
            has_transfer: merged.has_transfer,
            transfer_inputs: transfer_inputs.as_deref(),
            save_to_trino: merged.save_to_trino,
            trino_output: merged.trino_output.as_ref(),
        },
        &mut issues,
    );
    if !issues.is_empty() {
        return Err(SpecValidationError {
            tenant: String::new(),
            issues,
        });
    }

    merged.transfer_inputs = transfer_inputs.unwrap_or_else(|| vec![pipeline.name.to_string()]);
    Ok(merged)
}

impl TenantSpec {
    /// Resolve one of this tenant's pipelines for an environment
    pub fn resolve_pipeline(
        &self,
        pipeline: &PipelineSpec,
        environment: &str,
    ) -> Result<EffectivePipelineSpec, SpecValidationError> {
        resolve(pipeline, environment).map_err(|mut err| {
            err.tenant = self.id().to_string();
            err
        })
    }
}

/// Pick the environment to compile a tenant for.
///
/// Precedence: explicit argument, then the `TF_ENVIRONMENT` variable, then the
/// tenant's `default_environment`, then `"dev"`. Empty values are ignored.
pub fn resolve_environment(explicit: Option<&str>, tenant: &TenantSpec) -> String {
    explicit
        .filter(|e| !e.is_empty())
        .map(str::to_string)
        .or_else(|| std::env::var(ENVIRONMENT_VAR).ok().filter(|e| !e.is_empty()))
        .or_else(|| tenant.default_environment().map(str::to_string))
        .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string())
}

#[cfg(test)]
#[path = "environment_test.rs"]
mod tests;
