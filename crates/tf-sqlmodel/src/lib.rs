//! tf-sqlmodel - SQL-model manifests and the SQL-model bridge
//!
//! Parses the SQL transformation project's manifest (native document or dbt
//! `manifest.json`) and turns it into SQL-model nodes wired to the extract
//! stages that provide their sources.

pub mod bridge;
pub mod dbt;
pub mod manifest;

pub use bridge::{build_sql_model_subgraph, ResolvableSources, SqlModelSubgraph};
pub use manifest::{ModelRef, SqlManifest, SqlModelDef};
