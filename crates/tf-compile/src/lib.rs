//! tf-compile - Pipeline graph compiler for Tenantflow
//!
//! Compiles tenant specifications into validated stage graphs, one tenant at
//! a time or in batches.

pub mod batch;
pub mod compiler;
pub mod workspace;

pub use batch::{
    compile_all, compile_all_parallel, compile_tenant, BatchSummary, OutcomeStatus, TenantOutcome,
};
pub use compiler::{compile, compile_pipeline, PipelineStages};
pub use workspace::{compile_workspace, Workspace};
