//! tf-core - Core library for Tenantflow
//!
//! This crate provides the tenant specification model, environment override
//! resolution, the node key naming scheme, compiled graph types and graph
//! validation shared by the SQL-model bridge and the compiler.

pub mod environment;
pub mod error;
pub mod graph;
pub mod identifier;
pub mod interpolate;
pub mod key;
pub mod loading;
pub(crate) mod serde_helpers;
pub mod spec;
pub mod validate;

pub use environment::{resolve, resolve_environment, EffectivePipelineSpec};
pub use error::{CoreError, CoreResult, SpecIssue, SpecValidationError};
pub use graph::{Edge, GraphBuilder, Materialization, Node, NodeMetadata, TenantGraph};
pub use identifier::{PipelineName, TenantId};
pub use key::{key_for, KeyParseError, NodeKey, StageKind};
pub use loading::{discover_tenant_configs, load_tenant_file, LoadedTenant, TenantCatalog};
pub use spec::{EnvironmentOverride, PipelineSpec, TenantSpec, TrinoOutput};
pub use validate::{validate, GraphViolation, ValidationResult};
