use super::*;
use crate::error::SpecIssue;
use serial_test::serial;

const TENANT: &str = r#"
tenant:
  id: acme
  assets:
    pipelines:
      wip_snapshot:
        date_column: snapshot_date
        save_to_trino: true
        trino_output:
          target_schema: aps
          target_table: aps_input_wip
          key_columns: [project_id, snapshot_date]
        environments:
          dev:
            save_to_trino: false
            trino_output: null
          staging:
            source_table: WIP_STAGING
            date_column: null
            query: "SELECT * FROM WIP_STAGING WHERE 1 = 0"
          qa:
            trino_output: null
      lot_history:
        has_transfer: true
        save_to_s3: true
        environments:
          prod:
            transfer_inputs: [lot_history, wip_snapshot]
"#;

fn tenant() -> TenantSpec {
    TenantSpec::from_yaml_str(TENANT).unwrap()
}

#[test]
fn test_unlisted_environment_returns_base() {
    let spec = tenant();
    let wip = spec.pipeline("wip_snapshot").unwrap();
    let prod = resolve(wip, "prod").unwrap();

    assert_eq!(prod.environment, "prod");
    assert!(prod.save_to_trino);
    assert_eq!(prod.source_table, "wip_snapshot");
    assert_eq!(prod.date_column.as_deref(), Some("snapshot_date"));
    assert_eq!(
        prod.trino_target().map(|t| t.qualified_table()),
        Some("aps.aps_input_wip".to_string())
    );
}

#[test]
fn test_override_disables_trino_and_clears_descriptor() {
    let spec = tenant();
    let wip = spec.pipeline("wip_snapshot").unwrap();
    let dev = resolve(wip, "dev").unwrap();

    assert!(!dev.save_to_trino);
    assert!(dev.trino_output.is_none());
    assert!(dev.trino_target().is_none());
    assert!(!dev.has_load());
}

#[test]
fn test_null_clears_optional_field() {
    let spec = tenant();
    let wip = spec.pipeline("wip_snapshot").unwrap();
    let staging = resolve(wip, "staging").unwrap();

    assert_eq!(staging.source_table, "WIP_STAGING");
    assert!(staging.date_column.is_none());
    assert!(!staging.is_partitioned());
    assert_eq!(staging.extract_query(), "SELECT * FROM WIP_STAGING WHERE 1 = 0");
    // untouched fields inherit
    assert!(staging.save_to_trino);
}

#[test]
fn test_merged_spec_revalidated() {
    let spec = tenant();
    let wip = spec.pipeline("wip_snapshot").unwrap();
    let err = spec.resolve_pipeline(wip, "qa").unwrap_err();

    assert_eq!(err.tenant, "acme");
    assert_eq!(
        err.issues,
        vec![SpecIssue::MissingTrinoOutput {
            pipeline: "wip_snapshot".into(),
            environment: Some("qa".into()),
        }]
    );
}

#[test]
fn test_transfer_inputs_default_to_self() {
    let spec = tenant();
    let lot = spec.pipeline("lot_history").unwrap();
    let dev = resolve(lot, "dev").unwrap();
    assert_eq!(dev.transfer_inputs, vec!["lot_history".to_string()]);

    let prod = resolve(lot, "prod").unwrap();
    assert_eq!(
        prod.transfer_inputs,
        vec!["lot_history".to_string(), "wip_snapshot".to_string()]
    );
}

#[test]
fn test_default_extract_query() {
    let spec = tenant();
    let lot = spec.pipeline("lot_history").unwrap();
    let eff = resolve(lot, "dev").unwrap();
    assert_eq!(eff.extract_query(), "SELECT * FROM lot_history");
}

#[test]
fn test_resolve_is_pure() {
    let spec = tenant();
    let wip = spec.pipeline("wip_snapshot").unwrap();
    let before = wip.clone();
    let first = resolve(wip, "dev").unwrap();
    let second = resolve(wip, "dev").unwrap();
    assert_eq!(first, second);
    assert_eq!(&before, wip);
}

#[test]
#[serial]
fn test_resolve_environment_explicit_wins() {
    let original = std::env::var(ENVIRONMENT_VAR).ok();
    std::env::set_var(ENVIRONMENT_VAR, "staging");
    assert_eq!(resolve_environment(Some("prod"), &tenant()), "prod");
    match original {
        Some(v) => std::env::set_var(ENVIRONMENT_VAR, v),
        None => std::env::remove_var(ENVIRONMENT_VAR),
    }
}

#[test]
#[serial]
fn test_resolve_environment_uses_env_var() {
    let original = std::env::var(ENVIRONMENT_VAR).ok();
    std::env::set_var(ENVIRONMENT_VAR, "staging");
    assert_eq!(resolve_environment(None, &tenant()), "staging");
    match original {
        Some(v) => std::env::set_var(ENVIRONMENT_VAR, v),
        None => std::env::remove_var(ENVIRONMENT_VAR),
    }
}

#[test]
#[serial]
fn test_resolve_environment_tenant_default_then_dev() {
    let original = std::env::var(ENVIRONMENT_VAR).ok();
    std::env::remove_var(ENVIRONMENT_VAR);

    let with_default =
        TenantSpec::from_yaml_str("tenant:\n  id: beta\n  default_environment: prod\n").unwrap();
    assert_eq!(resolve_environment(None, &with_default), "prod");
    assert_eq!(resolve_environment(None, &tenant()), DEFAULT_ENVIRONMENT);

    if let Some(v) = original {
        std::env::set_var(ENVIRONMENT_VAR, v);
    }
}
