//! dbt `manifest.json` support
//!
//! Only the fields needed to build model nodes are read. Models come from
//! `nodes` entries with `resource_type == "model"`; their `depends_on.nodes`
//! ids are turned into typed references. Other resource types (tests, seeds,
//! snapshots) are ignored.

use crate::manifest::{ModelRef, SqlManifest, SqlModelDef};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use tf_core::error::{CoreError, CoreResult};
use tf_core::graph::Materialization;

/// dbt manifest.json structure (subset of fields we care about)
#[derive(Debug, Clone, Deserialize)]
pub struct DbtManifest {
    /// Nodes keyed by unique id; `BTreeMap` gives a stable model order
    #[serde(default)]
    pub nodes: BTreeMap<String, DbtNode>,

    #[serde(default)]
    pub sources: HashMap<String, DbtSource>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbtNode {
    /// Node name (e.g., "stg_orders")
    pub name: String,

    /// Resource type (model, test, seed, snapshot, ...)
    pub resource_type: String,

    #[serde(default)]
    pub config: DbtNodeConfig,

    #[serde(default)]
    pub depends_on: DbtDependsOn,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DbtNodeConfig {
    #[serde(default)]
    pub materialized: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DbtDependsOn {
    /// Unique ids of upstream nodes and sources
    #[serde(default)]
    pub nodes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbtSource {
    /// Source group (e.g., "raw")
    #[serde(default)]
    pub source_name: String,

    /// Name within the source group; references resolve it to a pipeline name
    pub name: String,
}

/// Map a dbt materialization onto the two kinds the graph distinguishes
pub fn map_materialization(materialized: Option<&str>) -> Result<Materialization, String> {
    match materialized {
        None | Some("view") | Some("ephemeral") => Ok(Materialization::View),
        Some("table") | Some("incremental") => Ok(Materialization::Table),
        Some(other) => Err(format!("unsupported materialization '{other}'")),
    }
}

impl DbtManifest {
    /// Convert to the native manifest, models ordered by unique id
    pub fn to_sql_manifest(&self) -> CoreResult<SqlManifest> {
        let mut models = Vec::new();
        for (unique_id, node) in &self.nodes {
            if node.resource_type != "model" {
                continue;
            }
            let materialization = map_materialization(node.config.materialized.as_deref())
                .map_err(|reason| CoreError::ManifestParse {
                    message: format!("model '{unique_id}': {reason}"),
                })?;

            let mut refs = Vec::with_capacity(node.depends_on.nodes.len());
            for dep in &node.depends_on.nodes {
                if let Some(reference) = self.reference_for(unique_id, dep)? {
                    refs.push(reference);
                }
            }

            models.push(SqlModelDef {
                name: node.name.clone(),
                materialization,
                refs,
            });
        }
        SqlManifest::new(models)
    }

    fn reference_for(&self, unique_id: &str, dep: &str) -> CoreResult<Option<ModelRef>> {
        let unknown = || CoreError::ManifestParse {
            message: format!("model '{unique_id}' depends on unknown node '{dep}'"),
        };
        match dep.split('.').next() {
            Some("source") => {
                let source = self.sources.get(dep).ok_or_else(unknown)?;
                Ok(Some(ModelRef::Source(source.name.clone())))
            }
            Some("model") => {
                let node = self.nodes.get(dep).ok_or_else(unknown)?;
                Ok(Some(ModelRef::Model(node.name.clone())))
            }
            _ => {
                log::debug!("Ignoring dependency '{dep}' of '{unique_id}'");
                Ok(None)
            }
        }
    }
}

impl SqlManifest {
    /// Parse a dbt `manifest.json`
    pub fn from_dbt_manifest_json(json: &str) -> CoreResult<Self> {
        let manifest: DbtManifest = serde_json::from_str(json).map_err(|e| CoreError::ManifestParse {
            message: e.to_string(),
        })?;
        manifest.to_sql_manifest()
    }
}

pub(crate) fn from_dbt_manifest_value(value: serde_json::Value) -> CoreResult<SqlManifest> {
    let manifest: DbtManifest = serde_json::from_value(value).map_err(|e| CoreError::ManifestParse {
        message: e.to_string(),
    })?;
    manifest.to_sql_manifest()
}

#[cfg(test)]
#[path = "dbt_test.rs"]
mod tests;
