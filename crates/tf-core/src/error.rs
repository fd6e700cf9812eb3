//! Error types for tf-core

use crate::validate::GraphViolation;
use thiserror::Error;

/// Core error type for Tenantflow
#[derive(Error, Debug)]
pub enum CoreError {
    /// TF001: Tenant configuration file or directory not found
    #[error("[TF001] Tenant config not found: {path}")]
    ConfigNotFound { path: String },

    /// TF002: Failed to parse a tenant configuration document
    #[error("[TF002] Failed to parse tenant config {path}: {message}")]
    ConfigParse { path: String, message: String },

    /// TF003: Two configuration documents declare the same tenant id
    #[error("[TF003] Duplicate tenant id '{tenant}' in {first} and {second}")]
    DuplicateTenant {
        tenant: String,
        first: String,
        second: String,
    },

    /// TF010: Malformed or internally inconsistent specification
    #[error("[TF010] {0}")]
    SpecValidation(#[from] SpecValidationError),

    /// TF020: A SQL model references a source no pipeline provides
    #[error("[TF020] Unresolved source reference 'source:{reference}' in SQL model '{model}'")]
    UnresolvedSourceReference { reference: String, model: String },

    /// TF021: The SQL-model manifest could not be interpreted
    #[error("[TF021] Failed to parse SQL-model manifest: {message}")]
    ManifestParse { message: String },

    /// TF030: A pipeline failed to compile
    #[error("[TF030] Failed to compile pipeline '{pipeline}': {source}")]
    PipelineCompile {
        pipeline: String,
        source: Box<CoreError>,
    },

    /// TF040: The compiled graph is structurally invalid
    #[error(
        "[TF040] Graph for tenant '{tenant}' failed validation: {}",
        join_messages(.violations)
    )]
    GraphValidation {
        tenant: String,
        violations: Vec<GraphViolation>,
    },

    /// TF090: IO error
    #[error("[TF090] IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TF091: IO error with file path context
    #[error("[TF091] Failed to read '{path}': {source}")]
    IoWithPath {
        path: String,
        source: std::io::Error,
    },

    /// TF092: YAML parse error
    #[error("[TF092] YAML error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// Wrap this error with the pipeline it occurred in.
    pub fn in_pipeline(self, pipeline: impl Into<String>) -> Self {
        CoreError::PipelineCompile {
            pipeline: pipeline.into(),
            source: Box::new(self),
        }
    }

    /// Every human-readable problem carried by this error, one entry per problem.
    ///
    /// Aggregating errors (spec validation, graph validation) expand to one
    /// message per issue so callers can show the complete list.
    pub fn messages(&self) -> Vec<String> {
        match self {
            CoreError::SpecValidation(err) => err.issues.iter().map(|i| i.to_string()).collect(),
            CoreError::GraphValidation { violations, .. } => {
                violations.iter().map(|v| v.to_string()).collect()
            }
            CoreError::PipelineCompile { pipeline, source } => source
                .messages()
                .into_iter()
                .map(|m| format!("pipeline '{pipeline}': {m}"))
                .collect(),
            other => vec![other.to_string()],
        }
    }
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;

/// Every structural problem found in one tenant specification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid specification for tenant '{tenant}': {}", summarize_issues(.issues))]
pub struct SpecValidationError {
    /// Tenant id as written in the document (may itself be invalid)
    pub tenant: String,

    /// All problems, in discovery order
    pub issues: Vec<SpecIssue>,
}

impl SpecValidationError {
    /// Returns `true` if any issue matches the predicate.
    pub fn has_issue(&self, pred: impl Fn(&SpecIssue) -> bool) -> bool {
        self.issues.iter().any(pred)
    }
}

/// One structural problem in a tenant specification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpecIssue {
    #[error("tenant id '{value}' must match ^[a-z][a-z0-9_]*$")]
    InvalidTenantId { value: String },

    #[error("pipeline name '{value}' must match ^[a-z][a-z0-9_]*$")]
    InvalidPipelineName { value: String },

    #[error("pipeline '{pipeline}' is declared more than once")]
    DuplicatePipeline { pipeline: String },

    #[error("pipeline '{pipeline}': source_table must not be empty{}", env_suffix(.environment))]
    EmptySourceTable {
        pipeline: String,
        environment: Option<String>,
    },

    #[error("pipeline '{pipeline}': save_to_trino is enabled but trino_output is missing{}", env_suffix(.environment))]
    MissingTrinoOutput {
        pipeline: String,
        environment: Option<String>,
    },

    #[error("pipeline '{pipeline}': invalid trino_output: {reason}{}", env_suffix(.environment))]
    InvalidTrinoOutput {
        pipeline: String,
        reason: String,
        environment: Option<String>,
    },

    #[error("pipeline '{pipeline}': date_column is set but partitioned is false{}", env_suffix(.environment))]
    DateColumnOnUnpartitioned {
        pipeline: String,
        environment: Option<String>,
    },

    #[error("pipeline '{pipeline}': partitioned is true but no date_column is set{}", env_suffix(.environment))]
    PartitionedWithoutDateColumn {
        pipeline: String,
        environment: Option<String>,
    },

    #[error("pipeline '{pipeline}': transfer input '{input}' is not a declared pipeline{}", env_suffix(.environment))]
    UnknownTransferInput {
        pipeline: String,
        input: String,
        environment: Option<String>,
    },

    #[error("pipeline '{pipeline}': transfer_inputs must not be empty{}", env_suffix(.environment))]
    EmptyTransferInputs {
        pipeline: String,
        environment: Option<String>,
    },

    #[error("pipeline '{pipeline}': environment name must not be empty")]
    EmptyEnvironmentName { pipeline: String },

    #[error("pipeline '{pipeline}': environment '{environment}' is overridden more than once")]
    DuplicateEnvironment {
        pipeline: String,
        environment: String,
    },
}

fn env_suffix(environment: &Option<String>) -> String {
    match environment {
        Some(env) => format!(" (environment '{env}')"),
        None => String::new(),
    }
}

fn summarize_issues(issues: &[SpecIssue]) -> String {
    format!("{} problem(s): {}", issues.len(), join_messages(issues))
}

fn join_messages<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
