use super::*;
use tf_sqlmodel::{ModelRef, SqlModelDef};
use tf_core::graph::Materialization;

fn tenant(yaml: &str) -> TenantSpec {
    TenantSpec::from_yaml_str(yaml).unwrap()
}

fn tenants() -> Vec<TenantSpec> {
    vec![
        tenant("tenant:\n  id: acme\n  assets:\n    pipelines:\n      orders:\n        save_to_s3: true\n"),
        tenant("tenant:\n  id: beta\n  assets:\n    pipelines:\n      items:\n        has_dbt_transform: true\n"),
        tenant("tenant:\n  id: gamma\n  environments:\n    prod:\n      enabled: false\n  assets:\n    pipelines:\n      events: {}\n"),
    ]
}

fn broken_manifest() -> SqlManifest {
    SqlManifest::new(vec![SqlModelDef {
        name: "stg_unknown".into(),
        materialization: Materialization::View,
        refs: vec![ModelRef::Source("unknown_table".into())],
    }])
    .unwrap()
}

#[test]
fn test_one_failure_does_not_block_others() {
    let specs = tenants();
    let mut manifests = HashMap::new();
    manifests.insert(TenantId::try_new("beta").unwrap(), broken_manifest());

    let outcomes = compile_all(&specs, Some("dev"), &manifests);
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes[0].is_compiled());
    assert!(matches!(
        outcomes[1].error(),
        Some(CoreError::UnresolvedSourceReference { reference, .. }) if reference == "unknown_table"
    ));
    assert!(outcomes[2].is_compiled());
    assert_eq!(
        BatchSummary::from_outcomes(&outcomes),
        BatchSummary { compiled: 2, skipped: 0, failed: 1 }
    );
}

#[test]
fn test_disabled_tenant_skipped() {
    let outcomes = compile_all(&tenants(), Some("prod"), &HashMap::new());
    assert_eq!(outcomes[2].tenant, "gamma");
    assert_eq!(outcomes[2].environment, "prod");
    assert!(outcomes[2].is_skipped());
    assert!(outcomes[2].graph().is_none());
    assert_eq!(BatchSummary::from_outcomes(&outcomes).skipped, 1);
}

#[test]
fn test_parallel_matches_sequential() {
    let specs = tenants();
    let mut manifests = HashMap::new();
    manifests.insert(TenantId::try_new("beta").unwrap(), broken_manifest());

    let sequential = compile_all(&specs, Some("dev"), &manifests);
    let parallel = compile_all_parallel(&specs, Some("dev"), &manifests, None);

    assert_eq!(sequential.len(), parallel.len());
    for (a, b) in sequential.iter().zip(&parallel) {
        assert_eq!(a.tenant, b.tenant);
        assert_eq!(a.is_compiled(), b.is_compiled());
        assert_eq!(
            a.graph().map(|g| g.fingerprint()),
            b.graph().map(|g| g.fingerprint())
        );
        assert_eq!(a.error().map(|e| e.to_string()), b.error().map(|e| e.to_string()));
    }
}

#[test]
fn test_bounded_pool_keeps_input_order() {
    let specs: Vec<TenantSpec> = (0..64)
        .map(|i| {
            TenantSpec::from_yaml_str(&format!(
                "tenant:\n  id: t{i}\n  assets:\n    pipelines:\n      orders:\n        save_to_s3: true\n"
            ))
            .unwrap()
        })
        .collect();

    let outcomes = compile_all_parallel(&specs, Some("dev"), &HashMap::new(), Some(2));
    assert_eq!(outcomes.len(), 64);
    for (i, outcome) in outcomes.iter().enumerate() {
        assert_eq!(outcome.tenant.as_str(), format!("t{i}"));
        assert_eq!(outcome.graph().unwrap().nodes().len(), 2);
    }
    assert_eq!(BatchSummary::from_outcomes(&outcomes).compiled, 64);
}

#[test]
fn test_summary_serializes() {
    let summary = BatchSummary { compiled: 1, skipped: 2, failed: 0 };
    assert_eq!(summary.total(), 3);
    assert_eq!(
        serde_json::to_value(summary).unwrap(),
        serde_json::json!({"compiled": 1, "skipped": 2, "failed": 0})
    );
}
