use super::*;
use crate::key::key_for;

fn acme() -> TenantId {
    TenantId::try_new("acme").unwrap()
}

fn extract(name: &str) -> Node {
    Node::new(
        key_for(&acme(), StageKind::Extract, name),
        name,
        NodeMetadata::Extract {
            source_table: name.to_string(),
            partitioned: false,
            date_column: None,
            query: format!("SELECT * FROM {name}"),
        },
    )
}

fn model(name: &str) -> Node {
    Node::new(
        key_for(&acme(), StageKind::SqlModel, name),
        "",
        NodeMetadata::SqlModel {
            materialization: Materialization::View,
        },
    )
}

fn sample() -> TenantGraph {
    let mut builder = GraphBuilder::new(acme(), "dev");
    builder.add_node(extract("orders"));
    builder.add_node(model("stg_orders"));
    builder.add_node(model("fct_orders"));
    builder.add_edge(
        key_for(&acme(), StageKind::Extract, "orders"),
        key_for(&acme(), StageKind::SqlModel, "stg_orders"),
    );
    builder.add_edge(
        key_for(&acme(), StageKind::SqlModel, "stg_orders"),
        key_for(&acme(), StageKind::SqlModel, "fct_orders"),
    );
    builder.build()
}

#[test]
fn test_lookup_and_neighbours() {
    let graph = sample();
    let stg = key_for(&acme(), StageKind::SqlModel, "stg_orders");

    assert_eq!(graph.node(&stg).unwrap().kind(), StageKind::SqlModel);
    assert_eq!(graph.node(&stg).unwrap().pipeline(), "");
    assert_eq!(
        graph.upstream(&stg),
        vec![&key_for(&acme(), StageKind::Extract, "orders")]
    );
    assert_eq!(
        graph.downstream(&stg),
        vec![&key_for(&acme(), StageKind::SqlModel, "fct_orders")]
    );
    assert!(graph.node(&key_for(&acme(), StageKind::Load, "orders")).is_none());
}

#[test]
fn test_nodes_of_kind() {
    let graph = sample();
    assert_eq!(graph.nodes_of_kind(StageKind::SqlModel).count(), 2);
    assert_eq!(graph.nodes_of_kind(StageKind::Transfer).count(), 0);
}

#[test]
fn test_topological_order() {
    let graph = sample();
    let order: Vec<String> = graph
        .topological_order()
        .unwrap()
        .iter()
        .map(|k| k.to_string())
        .collect();
    assert_eq!(
        order,
        vec!["acme/extract/orders", "acme/dbt/stg_orders", "acme/dbt/fct_orders"]
    );
}

#[test]
fn test_topological_order_rejects_cycle() {
    let mut builder = GraphBuilder::new(acme(), "dev");
    builder.add_node(model("a"));
    builder.add_node(model("b"));
    builder.add_edge(key_for(&acme(), StageKind::SqlModel, "a"), key_for(&acme(), StageKind::SqlModel, "b"));
    builder.add_edge(key_for(&acme(), StageKind::SqlModel, "b"), key_for(&acme(), StageKind::SqlModel, "a"));
    let err = builder.build().topological_order().unwrap_err();
    assert!(matches!(err, CoreError::GraphValidation { .. }));
    assert!(err.to_string().contains("cycle"), "{err}");
}

#[test]
fn test_fingerprint_ignores_construction_order() {
    let forward = sample();

    let mut builder = GraphBuilder::new(acme(), "dev");
    builder.add_node(model("fct_orders"));
    builder.add_node(model("stg_orders"));
    builder.add_node(extract("orders"));
    builder.add_edge(
        key_for(&acme(), StageKind::SqlModel, "stg_orders"),
        key_for(&acme(), StageKind::SqlModel, "fct_orders"),
    );
    builder.add_edge(
        key_for(&acme(), StageKind::Extract, "orders"),
        key_for(&acme(), StageKind::SqlModel, "stg_orders"),
    );
    let reversed = builder.build();

    assert_eq!(forward.fingerprint(), reversed.fingerprint());
    assert_eq!(forward.node_keys(), reversed.node_keys());
    assert_eq!(forward.edge_set(), reversed.edge_set());
    assert_eq!(forward.fingerprint().len(), 64);
}

#[test]
fn test_fingerprint_changes_with_metadata() {
    let mut builder = GraphBuilder::new(acme(), "dev");
    builder.add_node(Node::new(
        key_for(&acme(), StageKind::SqlModel, "stg_orders"),
        "",
        NodeMetadata::SqlModel {
            materialization: Materialization::Table,
        },
    ));
    let table = builder.build();

    let mut builder = GraphBuilder::new(acme(), "dev");
    builder.add_node(model("stg_orders"));
    let view = builder.build();

    assert_ne!(table.fingerprint(), view.fingerprint());
}

#[test]
fn test_json_output() {
    let mut tags = BTreeMap::new();
    tags.insert("team".to_string(), "data".to_string());
    let mut builder = GraphBuilder::new(acme(), "prod").with_tags(tags);
    builder.add_node(extract("orders"));
    let graph = builder.build();

    let value: serde_json::Value = serde_json::from_str(&graph.to_json().unwrap()).unwrap();
    assert_eq!(value["tenant"], "acme");
    assert_eq!(value["environment"], "prod");
    assert_eq!(value["tags"]["team"], "data");
    let node = &value["nodes"][0];
    assert_eq!(node["key"], "acme/extract/orders");
    assert_eq!(node["kind"], "extract");
    assert_eq!(node["pipeline"], "orders");
    assert_eq!(node["query"], "SELECT * FROM orders");
    assert!(value.get("index").is_none());
}

#[test]
fn test_sql_model_kind_token_in_json() {
    let mut builder = GraphBuilder::new(acme(), "dev");
    builder.add_node(model("stg_orders"));
    let value: serde_json::Value = serde_json::from_str(&builder.build().to_json().unwrap()).unwrap();
    assert_eq!(value["nodes"][0]["kind"], "dbt");
    assert_eq!(value["nodes"][0]["materialization"], "view");
}
