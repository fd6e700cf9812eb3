use super::*;

fn acme() -> TenantId {
    TenantId::try_new("acme").unwrap()
}

#[test]
fn test_textual_form() {
    assert_eq!(
        key_for(&acme(), StageKind::Extract, "lot_history").to_string(),
        "acme/extract/lot_history"
    );
    assert_eq!(
        key_for(&acme(), StageKind::SqlModel, "stg_orders").to_string(),
        "acme/dbt/stg_orders"
    );
}

#[test]
fn test_same_triple_same_key() {
    let a = key_for(&acme(), StageKind::Load, "orders");
    let b = key_for(&acme(), StageKind::Load, "orders");
    assert_eq!(a, b);
}

#[test]
fn test_different_component_different_key() {
    let base = key_for(&acme(), StageKind::Extract, "orders");
    let other_tenant = key_for(&TenantId::try_new("beta").unwrap(), StageKind::Extract, "orders");
    let other_kind = key_for(&acme(), StageKind::Transfer, "orders");
    let other_name = key_for(&acme(), StageKind::Extract, "refunds");
    assert_ne!(base, other_tenant);
    assert_ne!(base, other_kind);
    assert_ne!(base, other_name);
    assert_ne!(base.to_string(), other_kind.to_string());
}

#[test]
fn test_same_local_name_across_kinds_distinct() {
    // a pipeline and a SQL model sharing a name do not collide
    let extract = key_for(&acme(), StageKind::Extract, "orders");
    let model = key_for(&acme(), StageKind::SqlModel, "orders");
    assert_ne!(extract, model);
}

#[test]
fn test_parse_inverse_of_display() {
    let key = key_for(&acme(), StageKind::Transfer, "lot_history");
    let parsed = NodeKey::parse(&key.to_string()).unwrap();
    assert_eq!(parsed, key);
    assert_eq!(parsed.tenant(), "acme");
    assert_eq!(parsed.kind(), StageKind::Transfer);
    assert_eq!(parsed.local_name(), "lot_history");
}

#[test]
fn test_parse_errors() {
    assert!(matches!(NodeKey::parse("acme/extract"), Err(KeyParseError::Shape(_))));
    assert!(matches!(NodeKey::parse("acme/extract/"), Err(KeyParseError::Shape(_))));
    assert!(matches!(NodeKey::parse("Acme/extract/x"), Err(KeyParseError::Tenant(_))));
    assert!(matches!(NodeKey::parse("acme/sql/x"), Err(KeyParseError::Kind(_))));
}

#[test]
fn test_serializes_as_string() {
    let key = key_for(&acme(), StageKind::Load, "orders");
    assert_eq!(serde_json::to_string(&key).unwrap(), r#""acme/load/orders""#);
    let back: NodeKey = serde_json::from_str(r#""acme/load/orders""#).unwrap();
    assert_eq!(back, key);
}

#[test]
fn test_stage_kind_tokens() {
    for kind in StageKind::ALL {
        assert_eq!(StageKind::from_token(kind.token()), Some(kind));
    }
    assert_eq!(serde_json::to_string(&StageKind::SqlModel).unwrap(), r#""dbt""#);
}
