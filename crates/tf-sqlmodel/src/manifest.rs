//! SQL-model manifests
//!
//! A manifest lists the models of a tenant's SQL transformation project with
//! their materialization and typed references. Two input formats are read:
//!
//! - the native document (YAML or JSON):
//!   `models: [{name, materialization, refs: ["source:x", "model:y"]}]`
//! - a dbt `manifest.json` (see [`crate::dbt`])

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tf_core::error::{CoreError, CoreResult};
use tf_core::graph::Materialization;

/// A typed reference from a model to its input
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ModelRef {
    /// `source:<name>`: the extracted data of the pipeline with that name
    Source(String),
    /// `model:<name>`: another model in the same manifest
    Model(String),
}

impl ModelRef {
    pub fn parse(text: &str) -> Result<Self, String> {
        let (prefix, name) = text
            .split_once(':')
            .ok_or_else(|| format!("reference '{text}' must look like source:<name> or model:<name>"))?;
        if name.is_empty() {
            return Err(format!("reference '{text}' has an empty name"));
        }
        match prefix {
            "source" => Ok(ModelRef::Source(name.to_string())),
            "model" => Ok(ModelRef::Model(name.to_string())),
            other => Err(format!(
                "reference '{text}' has unknown type '{other}' (expected source or model)"
            )),
        }
    }
}

impl TryFrom<String> for ModelRef {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ModelRef> for String {
    fn from(value: ModelRef) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelRef::Source(name) => write!(f, "source:{name}"),
            ModelRef::Model(name) => write!(f, "model:{name}"),
        }
    }
}

/// One model as listed in a manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SqlModelDef {
    pub name: String,

    #[serde(default = "default_materialization")]
    pub materialization: Materialization,

    #[serde(default)]
    pub refs: Vec<ModelRef>,
}

fn default_materialization() -> Materialization {
    Materialization::View
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NativeManifest {
    #[serde(default)]
    models: Vec<SqlModelDef>,
}

/// Parsed SQL-model manifest; models keep their listed order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlManifest {
    models: Vec<SqlModelDef>,
}

impl SqlManifest {
    /// A manifest without models (tenants with no SQL project)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a manifest, rejecting model names that cannot form a node key
    pub fn new(models: Vec<SqlModelDef>) -> CoreResult<Self> {
        for model in &models {
            if model.name.trim().is_empty() || model.name.contains('/') {
                return Err(CoreError::ManifestParse {
                    message: format!("invalid model name '{}'", model.name),
                });
            }
        }
        Ok(Self { models })
    }

    pub fn models(&self) -> &[SqlModelDef] {
        &self.models
    }

    pub fn model(&self, name: &str) -> Option<&SqlModelDef> {
        self.models.iter().find(|m| m.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Parse the native document from YAML
    pub fn from_yaml_str(yaml: &str) -> CoreResult<Self> {
        let doc: NativeManifest = serde_yaml::from_str(yaml).map_err(|e| CoreError::ManifestParse {
            message: e.to_string(),
        })?;
        Self::new(doc.models)
    }

    /// Parse the native document from JSON
    pub fn from_json_str(json: &str) -> CoreResult<Self> {
        let doc: NativeManifest = serde_json::from_str(json).map_err(|e| CoreError::ManifestParse {
            message: e.to_string(),
        })?;
        Self::new(doc.models)
    }

    /// Read a manifest file.
    ///
    /// `.yml`/`.yaml` files are native documents. JSON files with a top-level
    /// `nodes` object are treated as dbt manifests, other JSON files as native
    /// documents.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })?;

        let with_path = |err: CoreError| match err {
            CoreError::ManifestParse { message } => CoreError::ManifestParse {
                message: format!("{}: {}", path.display(), message),
            },
            other => other,
        };

        let parsed = if path.extension().is_some_and(|e| e == "yml" || e == "yaml") {
            Self::from_yaml_str(&content)
        } else {
            let value: CoreResult<serde_json::Value> =
                serde_json::from_str(&content).map_err(|e| CoreError::ManifestParse {
                    message: e.to_string(),
                });
            match value {
                Ok(v) if v.get("nodes").is_some_and(|n| n.is_object()) => {
                    crate::dbt::from_dbt_manifest_value(v)
                }
                Ok(_) => Self::from_json_str(&content),
                Err(e) => Err(e),
            }
        };
        let manifest = parsed.map_err(with_path)?;

        log::debug!("Loaded {} SQL model(s) from {}", manifest.len(), path.display());
        Ok(manifest)
    }
}

#[cfg(test)]
#[path = "manifest_test.rs"]
mod tests;
