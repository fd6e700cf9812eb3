//! Tenant and pipeline specifications
//!
//! A tenant document is read in two steps. `serde_yaml` first produces the raw
//! document types (`RawDocument`, `RawTenant`, `RawPipeline`), which accept
//! anything structurally well-formed. [`TenantSpec::from_raw`] then checks
//! every semantic rule and reports all problems at once as a
//! [`SpecValidationError`].

use crate::error::{CoreResult, SpecIssue, SpecValidationError};
use crate::identifier::{PipelineName, TenantId};
use crate::interpolate::interpolate_str;
use crate::serde_helpers::{default_true, double_option};
use serde::de::{IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::marker::PhantomData;
use std::path::PathBuf;

/// Target table descriptor for the Trino sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrinoOutput {
    /// Target schema
    pub target_schema: String,

    /// Target table
    pub target_table: String,

    /// Upsert key columns, in order
    #[serde(default)]
    pub key_columns: Vec<String>,
}

impl TrinoOutput {
    /// `schema.table`
    pub fn qualified_table(&self) -> String {
        format!("{}.{}", self.target_schema, self.target_table)
    }

    fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.target_schema.trim().is_empty() {
            problems.push("target_schema must not be empty".to_string());
        }
        if self.target_table.trim().is_empty() {
            problems.push("target_table must not be empty".to_string());
        }
        let mut seen = HashSet::new();
        for column in &self.key_columns {
            if column.trim().is_empty() {
                problems.push("key_columns must not contain empty names".to_string());
            } else if !seen.insert(column.as_str()) {
                problems.push(format!("key column '{column}' is listed twice"));
            }
        }
        problems
    }
}

/// Ordered `(key, value)` entries of a YAML mapping.
///
/// Unlike a `HashMap`, this keeps declaration order and does not collapse
/// repeated keys, so duplicates can be reported instead of silently dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedEntries<T>(pub Vec<(String, T)>);

impl<T> Default for OrderedEntries<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for OrderedEntries<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct EntriesVisitor<T>(PhantomData<T>);

        impl<'de, T: Deserialize<'de>> Visitor<'de> for EntriesVisitor<T> {
            type Value = OrderedEntries<T>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping")
            }

            fn visit_unit<E>(self) -> Result<Self::Value, E> {
                Ok(OrderedEntries::default())
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::new();
                while let Some((key, value)) = map.next_entry::<String, T>()? {
                    entries.push((key, value));
                }
                Ok(OrderedEntries(entries))
            }
        }

        deserializer.deserialize_any(EntriesVisitor(PhantomData))
    }
}

/// Top-level tenant configuration document (`tenant:` key)
#[derive(Debug, Clone, Deserialize)]
pub struct RawDocument {
    pub tenant: RawTenant,
}

/// Raw tenant section, before validation.
///
/// Unknown keys are tolerated here: connection sections (source database,
/// storage, target database) belong to the execution side and are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTenant {
    pub id: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub default_environment: Option<String>,

    #[serde(default)]
    pub environments: BTreeMap<String, TenantEnvironment>,

    #[serde(default)]
    pub tags: BTreeMap<String, String>,

    #[serde(default)]
    pub sql_models: SqlModelSettings,

    #[serde(default)]
    pub assets: RawAssets,
}

/// Raw `assets` section
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawAssets {
    #[serde(default)]
    pub pipelines: OrderedEntries<RawPipeline>,
}

/// Raw pipeline declaration, before validation
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawPipeline {
    #[serde(default)]
    pub source_table: Option<String>,

    #[serde(default)]
    pub date_column: Option<String>,

    #[serde(default)]
    pub partitioned: Option<bool>,

    #[serde(default)]
    pub query: Option<String>,

    #[serde(default)]
    pub has_transfer: bool,

    #[serde(default)]
    pub transfer_inputs: Option<Vec<String>>,

    #[serde(default)]
    pub has_dbt_transform: bool,

    #[serde(default)]
    pub save_to_s3: bool,

    #[serde(default)]
    pub save_to_trino: bool,

    #[serde(default)]
    pub trino_output: Option<TrinoOutput>,

    #[serde(default)]
    pub environments: OrderedEntries<EnvironmentOverride>,
}

/// Tenant-level switch for one environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TenantEnvironment {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for TenantEnvironment {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Where the tenant's SQL-model manifest lives
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SqlModelSettings {
    /// Manifest path, relative to the tenant configuration file's directory
    #[serde(default)]
    pub manifest_path: Option<PathBuf>,
}

/// Partial pipeline specification applied for one environment.
///
/// Every field is optional; an absent field inherits the base value. Fields
/// that are optional in the base spec accept an explicit `null` to clear them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentOverride {
    #[serde(default)]
    pub source_table: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    pub date_column: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    pub partitioned: Option<Option<bool>>,

    #[serde(default, deserialize_with = "double_option")]
    pub query: Option<Option<String>>,

    #[serde(default)]
    pub has_transfer: Option<bool>,

    #[serde(default, deserialize_with = "double_option")]
    pub transfer_inputs: Option<Option<Vec<String>>>,

    #[serde(default)]
    pub has_dbt_transform: Option<bool>,

    #[serde(default)]
    pub save_to_s3: Option<bool>,

    #[serde(default)]
    pub save_to_trino: Option<bool>,

    #[serde(default, deserialize_with = "double_option")]
    pub trino_output: Option<Option<TrinoOutput>>,
}

/// A validated pipeline declaration
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSpec {
    /// Pipeline name (unique within the tenant)
    pub name: PipelineName,

    /// Source table in the relational source (defaults to the pipeline name)
    pub source_table: String,

    /// Partition date column; presence means the pipeline is partitioned
    pub date_column: Option<String>,

    /// Explicit partition flag, checked against `date_column`
    pub partitioned: Option<bool>,

    /// Custom extract query
    pub query: Option<String>,

    pub has_transfer: bool,

    /// Pipelines whose extract output feeds the transfer stage
    pub transfer_inputs: Option<Vec<String>>,

    pub has_dbt_transform: bool,
    pub save_to_s3: bool,
    pub save_to_trino: bool,

    /// Required iff `save_to_trino`
    pub trino_output: Option<TrinoOutput>,

    /// Environment overrides in declaration order
    pub environments: Vec<(String, EnvironmentOverride)>,
}

impl PipelineSpec {
    /// Whether the base spec is partitioned
    pub fn is_partitioned(&self) -> bool {
        self.date_column.is_some()
    }

    /// Override declared for an environment, if any
    pub fn override_for(&self, environment: &str) -> Option<&EnvironmentOverride> {
        self.environments
            .iter()
            .find(|(name, _)| name == environment)
            .map(|(_, o)| o)
    }
}

/// A validated tenant specification.
///
/// Only constructible through [`TenantSpec::from_raw`] (or the parsing helpers
/// built on it), so every instance has passed the structural checks.
#[derive(Debug, Clone, PartialEq)]
pub struct TenantSpec {
    id: TenantId,
    name: String,
    enabled: bool,
    default_environment: Option<String>,
    environments: BTreeMap<String, TenantEnvironment>,
    tags: BTreeMap<String, String>,
    sql_models: SqlModelSettings,
    pipelines: Vec<PipelineSpec>,
}

impl TenantSpec {
    /// Parse and validate a tenant document from YAML text
    pub fn from_yaml_str(yaml: &str) -> CoreResult<Self> {
        let raw = RawTenant::from_yaml_str(yaml)?;
        Ok(Self::from_raw(raw)?)
    }

    /// Validate a raw tenant section, collecting every problem found
    pub fn from_raw(raw: RawTenant) -> Result<Self, SpecValidationError> {
        let mut issues = Vec::new();

        let id = TenantId::try_new(raw.id.clone());
        if id.is_none() {
            issues.push(SpecIssue::InvalidTenantId {
                value: raw.id.clone(),
            });
        }

        let declared: HashSet<&str> = raw
            .assets
            .pipelines
            .0
            .iter()
            .map(|(name, _)| name.as_str())
            .collect();

        let mut seen = HashSet::new();
        let mut pipelines = Vec::with_capacity(raw.assets.pipelines.0.len());
        for (name, pipeline) in &raw.assets.pipelines.0 {
            if !seen.insert(name.as_str()) {
                issues.push(SpecIssue::DuplicatePipeline {
                    pipeline: name.clone(),
                });
                continue;
            }
            let Some(pipeline_name) = PipelineName::try_new(name.clone()) else {
                issues.push(SpecIssue::InvalidPipelineName {
                    value: name.clone(),
                });
                continue;
            };
            if let Some(spec) = validate_pipeline(pipeline_name, pipeline, &declared, &mut issues) {
                pipelines.push(spec);
            }
        }

        match id {
            Some(id) if issues.is_empty() => Ok(Self {
                name: raw.name.unwrap_or_else(|| id.to_string()),
                id,
                enabled: raw.enabled,
                default_environment: raw.default_environment,
                environments: raw.environments,
                tags: raw.tags,
                sql_models: raw.sql_models,
                pipelines,
            }),
            _ => Err(SpecValidationError {
                tenant: raw.id,
                issues,
            }),
        }
    }

    pub fn id(&self) -> &TenantId {
        &self.id
    }

    /// Display name (defaults to the id)
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default_environment(&self) -> Option<&str> {
        self.default_environment.as_deref()
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    pub fn sql_models(&self) -> &SqlModelSettings {
        &self.sql_models
    }

    /// Pipelines in declaration order
    pub fn pipelines(&self) -> &[PipelineSpec] {
        &self.pipelines
    }

    pub fn pipeline(&self, name: &str) -> Option<&PipelineSpec> {
        self.pipelines.iter().find(|p| p.name == name)
    }

    /// Whether this tenant should be compiled for an environment.
    ///
    /// A disabled tenant is never compiled; an environment not listed under
    /// the tenant's `environments` is enabled.
    pub fn is_enabled_for(&self, environment: &str) -> bool {
        self.enabled
            && self
                .environments
                .get(environment)
                .map_or(true, |env| env.enabled)
    }
}

/// Field values shared by base specs and merged specs for consistency checks.
pub(crate) struct StageFields<'a> {
    pub source_table: &'a str,
    pub date_column: Option<&'a str>,
    pub partitioned: Option<bool>,
    pub has_transfer: bool,
    pub transfer_inputs: Option<&'a [String]>,
    pub save_to_trino: bool,
    pub trino_output: Option<&'a TrinoOutput>,
}

/// Check the rules that must hold both before and after an environment merge.
pub(crate) fn check_consistency(
    pipeline: &str,
    environment: Option<&str>,
    fields: &StageFields<'_>,
    issues: &mut Vec<SpecIssue>,
) {
    let environment = environment.map(str::to_string);

    if fields.source_table.trim().is_empty() {
        issues.push(SpecIssue::EmptySourceTable {
            pipeline: pipeline.to_string(),
            environment: environment.clone(),
        });
    }

    match (fields.date_column, fields.partitioned) {
        (Some(_), Some(false)) => issues.push(SpecIssue::DateColumnOnUnpartitioned {
            pipeline: pipeline.to_string(),
            environment: environment.clone(),
        }),
        (None, Some(true)) => issues.push(SpecIssue::PartitionedWithoutDateColumn {
            pipeline: pipeline.to_string(),
            environment: environment.clone(),
        }),
        _ => {}
    }

    if fields.has_transfer && fields.transfer_inputs.is_some_and(|inputs| inputs.is_empty()) {
        issues.push(SpecIssue::EmptyTransferInputs {
            pipeline: pipeline.to_string(),
            environment: environment.clone(),
        });
    }

    if fields.save_to_trino {
        match fields.trino_output {
            None => issues.push(SpecIssue::MissingTrinoOutput {
                pipeline: pipeline.to_string(),
                environment: environment.clone(),
            }),
            Some(output) => {
                for reason in output.problems() {
                    issues.push(SpecIssue::InvalidTrinoOutput {
                        pipeline: pipeline.to_string(),
                        reason,
                        environment: environment.clone(),
                    });
                }
            }
        }
    }
}

fn check_transfer_inputs(
    pipeline: &str,
    environment: Option<&str>,
    inputs: &[String],
    declared: &HashSet<&str>,
    issues: &mut Vec<SpecIssue>,
) {
    for input in inputs {
        if !declared.contains(input.as_str()) {
            issues.push(SpecIssue::UnknownTransferInput {
                pipeline: pipeline.to_string(),
                input: input.clone(),
                environment: environment.map(str::to_string),
            });
        }
    }
}

fn validate_pipeline(
    name: PipelineName,
    raw: &RawPipeline,
    declared: &HashSet<&str>,
    issues: &mut Vec<SpecIssue>,
) -> Option<PipelineSpec> {
    let before = issues.len();
    let source_table = raw
        .source_table
        .clone()
        .unwrap_or_else(|| name.to_string());

    check_consistency(
        &name,
        None,
        &StageFields {
            source_table: &source_table,
            date_column: raw.date_column.as_deref(),
            partitioned: raw.partitioned,
            has_transfer: raw.has_transfer,
            transfer_inputs: raw.transfer_inputs.as_deref(),
            save_to_trino: raw.save_to_trino,
            trino_output: raw.trino_output.as_ref(),
        },
        issues,
    );
    if let Some(inputs) = &raw.transfer_inputs {
        check_transfer_inputs(&name, None, inputs, declared, issues);
    }

    let mut seen_envs = HashSet::new();
    for (env, overrides) in &raw.environments.0 {
        if env.trim().is_empty() {
            issues.push(SpecIssue::EmptyEnvironmentName {
                pipeline: name.to_string(),
            });
            continue;
        }
        if !seen_envs.insert(env.as_str()) {
            issues.push(SpecIssue::DuplicateEnvironment {
                pipeline: name.to_string(),
                environment: env.clone(),
            });
            continue;
        }
        if let Some(Some(inputs)) = &overrides.transfer_inputs {
            check_transfer_inputs(&name, Some(env), inputs, declared, issues);
        }
    }

    if issues.len() > before {
        return None;
    }

    Some(PipelineSpec {
        name,
        source_table,
        date_column: raw.date_column.clone(),
        partitioned: raw.partitioned,
        query: raw.query.clone(),
        has_transfer: raw.has_transfer,
        transfer_inputs: raw.transfer_inputs.clone(),
        has_dbt_transform: raw.has_dbt_transform,
        save_to_s3: raw.save_to_s3,
        save_to_trino: raw.save_to_trino,
        trino_output: raw.trino_output.clone(),
        environments: raw.environments.0.clone(),
    })
}

type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

fn interpolate_in_place(value: &mut String, lookup: Lookup<'_>) {
    *value = interpolate_str(value, lookup);
}

fn interpolate_opt(value: &mut Option<String>, lookup: Lookup<'_>) {
    if let Some(v) = value {
        interpolate_in_place(v, lookup);
    }
}

fn interpolate_trino(output: &mut TrinoOutput, lookup: Lookup<'_>) {
    interpolate_in_place(&mut output.target_schema, lookup);
    interpolate_in_place(&mut output.target_table, lookup);
    for column in &mut output.key_columns {
        interpolate_in_place(column, lookup);
    }
}

/// Top-level keys of a tenant document, with every value skipped unparsed
struct TopLevelKeys {
    has_tenant: bool,
}

impl<'de> Deserialize<'de> for TopLevelKeys {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct KeysVisitor;

        impl<'de> Visitor<'de> for KeysVisitor {
            type Value = TopLevelKeys;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a tenant document mapping")
            }

            fn visit_unit<E>(self) -> Result<Self::Value, E> {
                Ok(TopLevelKeys { has_tenant: false })
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut has_tenant = false;
                while let Some(key) = map.next_key::<serde_yaml::Value>()? {
                    has_tenant |= key.as_str() == Some("tenant");
                    map.next_value::<IgnoredAny>()?;
                }
                Ok(TopLevelKeys { has_tenant })
            }
        }

        deserializer.deserialize_any(KeysVisitor)
    }
}

impl RawTenant {
    /// Parse a tenant document, either wrapped in a `tenant:` key or bare.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, serde_yaml::Error> {
        // Non-mapping documents take the wrapped path so the error names the
        // expected shape.
        let wrapped = serde_yaml::from_str::<TopLevelKeys>(yaml)
            .map(|keys| keys.has_tenant)
            .unwrap_or(true);
        if wrapped {
            serde_yaml::from_str::<RawDocument>(yaml).map(|doc| doc.tenant)
        } else {
            serde_yaml::from_str::<RawTenant>(yaml)
        }
    }

    /// Expand `${VAR}` / `${VAR:default}` placeholders in every string value.
    ///
    /// Mapping keys (pipeline and environment names) are left untouched.
    pub fn interpolate_with(&mut self, lookup: Lookup<'_>) {
        interpolate_in_place(&mut self.id, lookup);
        interpolate_opt(&mut self.name, lookup);
        interpolate_opt(&mut self.default_environment, lookup);
        for value in self.tags.values_mut() {
            interpolate_in_place(value, lookup);
        }
        if let Some(path) = &self.sql_models.manifest_path {
            let expanded = interpolate_str(&path.to_string_lossy(), lookup);
            self.sql_models.manifest_path = Some(PathBuf::from(expanded));
        }
        for (_, pipeline) in &mut self.assets.pipelines.0 {
            pipeline.interpolate_with(lookup);
        }
    }
}

impl RawPipeline {
    fn interpolate_with(&mut self, lookup: Lookup<'_>) {
        interpolate_opt(&mut self.source_table, lookup);
        interpolate_opt(&mut self.date_column, lookup);
        interpolate_opt(&mut self.query, lookup);
        for input in self.transfer_inputs.iter_mut().flatten() {
            interpolate_in_place(input, lookup);
        }
        if let Some(output) = &mut self.trino_output {
            interpolate_trino(output, lookup);
        }
        for (_, overrides) in &mut self.environments.0 {
            overrides.interpolate_with(lookup);
        }
    }
}

impl EnvironmentOverride {
    fn interpolate_with(&mut self, lookup: Lookup<'_>) {
        interpolate_opt(&mut self.source_table, lookup);
        if let Some(value) = &mut self.date_column {
            interpolate_opt(value, lookup);
        }
        if let Some(value) = &mut self.query {
            interpolate_opt(value, lookup);
        }
        if let Some(Some(inputs)) = &mut self.transfer_inputs {
            for input in inputs {
                interpolate_in_place(input, lookup);
            }
        }
        if let Some(Some(output)) = &mut self.trino_output {
            interpolate_trino(output, lookup);
        }
    }
}

#[cfg(test)]
#[path = "spec_test.rs"]
mod tests;
