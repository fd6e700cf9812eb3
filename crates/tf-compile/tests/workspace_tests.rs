//! Directory-level compilation over temporary tenant layouts.

use serial_test::serial;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use tf_compile::{compile_workspace, BatchSummary, OutcomeStatus, Workspace};
use tf_core::key::StageKind;
use tf_core::CoreError;

fn write(dir: &Path, rel: &str, content: &str) {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

const ACME_CONFIG: &str = r#"
tenant:
  id: acme
  default_environment: prod
  sql_models:
    manifest_path: dbt/models.yml
  assets:
    pipelines:
      cfg_item_master:
        has_dbt_transform: true
        save_to_s3: true
"#;

const ACME_MODELS: &str = r#"
models:
  - name: stg_cfg_item_master
    refs: ["source:cfg_item_master"]
"#;

fn layout() -> TempDir {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "acme/config.yaml", ACME_CONFIG);
    write(tmp.path(), "acme/dbt/models.yml", ACME_MODELS);
    write(
        tmp.path(),
        "tenant_beta.yaml",
        "tenant:\n  id: beta\n  environments:\n    dev:\n      enabled: false\n  assets:\n    pipelines:\n      orders: {}\n",
    );
    write(tmp.path(), "_template/config.yaml", "tenant:\n  id: template\n");
    tmp
}

#[test]
fn test_workspace_compiles_each_tenant_with_its_manifest() {
    let tmp = layout();
    let workspace = Workspace::load(tmp.path()).unwrap();
    assert_eq!(workspace.tenants().len(), 2);
    assert!(workspace.load_failures().is_empty());

    let outcomes = workspace.compile(Some("prod"));
    let acme = outcomes[0].graph().unwrap();
    assert_eq!(acme.nodes_of_kind(StageKind::SqlModel).count(), 1);
    assert_eq!(acme.nodes_of_kind(StageKind::Load).count(), 1);
    assert!(outcomes[1].is_compiled());
}

#[test]
fn test_disabled_environment_skipped() {
    let tmp = layout();
    let outcomes = compile_workspace(tmp.path(), Some("dev")).unwrap();
    assert!(outcomes[0].is_compiled());
    match &outcomes[1].status {
        OutcomeStatus::Skipped { reason } => assert!(reason.contains("beta")),
        other => panic!("expected skipped, got {other:?}"),
    }
    assert_eq!(
        BatchSummary::from_outcomes(&outcomes),
        BatchSummary { compiled: 1, skipped: 1, failed: 0 }
    );
}

#[test]
fn test_missing_manifest_fails_only_that_tenant() {
    let tmp = layout();
    fs::remove_file(tmp.path().join("acme/dbt/models.yml")).unwrap();

    let outcomes = compile_workspace(tmp.path(), Some("prod")).unwrap();
    assert!(matches!(outcomes[0].error(), Some(CoreError::IoWithPath { .. })));
    assert!(outcomes[1].is_compiled());
}

#[test]
fn test_broken_config_reported_as_load_failure() {
    let tmp = layout();
    write(tmp.path(), "gamma/config.yaml", "tenant:\n  id: gamma\n  assets:\n    pipelines:\n      orders:\n        save_to_trino: true\n");

    let workspace = Workspace::load(tmp.path()).unwrap();
    assert_eq!(workspace.tenants().len(), 2);
    assert_eq!(workspace.load_failures().len(), 1);
    assert!(workspace.load_failures()[0].path.ends_with("gamma/config.yaml"));
}

#[test]
fn test_parallel_workspace_compile_matches_sequential() {
    let tmp = layout();
    let workspace = Workspace::load(tmp.path()).unwrap();
    let sequential = workspace.compile(Some("prod"));
    let parallel = workspace.compile_parallel(Some("prod"), None);
    let bounded = workspace.compile_parallel(Some("prod"), Some(1));
    let fingerprints = |outcomes: &[tf_compile::TenantOutcome]| -> Vec<Option<String>> {
        outcomes.iter().map(|o| o.graph().map(|g| g.fingerprint())).collect()
    };
    assert_eq!(fingerprints(&sequential), fingerprints(&parallel));
    assert_eq!(fingerprints(&sequential), fingerprints(&bounded));
}

#[test]
fn test_missing_directory() {
    let tmp = TempDir::new().unwrap();
    let err = compile_workspace(&tmp.path().join("absent"), None).unwrap_err();
    assert!(matches!(err, CoreError::ConfigNotFound { .. }));
}

#[test]
#[serial]
fn test_environment_falls_back_to_variable_then_tenant_default() {
    let original = std::env::var("TF_ENVIRONMENT").ok();
    let tmp = layout();

    std::env::remove_var("TF_ENVIRONMENT");
    let outcomes = compile_workspace(tmp.path(), None).unwrap();
    assert_eq!(outcomes[0].environment, "prod");
    assert_eq!(outcomes[1].environment, "dev");
    assert!(outcomes[1].is_skipped());

    std::env::set_var("TF_ENVIRONMENT", "staging");
    let outcomes = compile_workspace(tmp.path(), None).unwrap();
    assert_eq!(outcomes[0].environment, "staging");
    assert!(outcomes[1].is_compiled());

    match original {
        Some(v) => std::env::set_var("TF_ENVIRONMENT", v),
        None => std::env::remove_var("TF_ENVIRONMENT"),
    }
}
