use provisioner_core::{SchemaModel, parse_ddl};
use provisioner_scenario::{ResolveError, load_scenario, resolve, scenario_json_schema};
use std::fs;
use std::path::{Path, PathBuf};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../fixtures/shop")
        .join(name)
}

fn shop_schema() -> SchemaModel {
    let sql = fs::read_to_string(fixture("schema.sql")).expect("read schema.sql");
    parse_ddl(&sql).expect("parse schema.sql")
}

#[test]
fn parents_precede_every_child() {
    let schema = shop_schema();
    let scenario = load_scenario(&fixture("full.json")).expect("load full.json");
    let resolved = resolve(&scenario, &schema).expect("resolve full.json");

    assert_eq!(
        resolved.table_order(),
        vec!["users", "products", "orders", "order_items"]
    );
    for (index, table) in resolved.tables.iter().enumerate() {
        for relation in &table.relations {
            assert!(
                relation.parent_index < index,
                "{} must come after {}",
                table.table.name,
                relation.parent.name
            );
        }
    }
    assert!(resolved.warnings.is_empty(), "{:?}", resolved.warnings);
}

#[test]
fn basic_scenario_resolves_in_document_order() {
    let schema = shop_schema();
    let scenario = load_scenario(&fixture("scenario.json")).expect("load scenario.json");
    let resolved = resolve(&scenario, &schema).expect("resolve");
    assert_eq!(resolved.table_order(), vec!["users", "orders"]);
    assert_eq!(resolved.total_rows(), 15);
}

#[test]
fn child_first_scenario_names_the_relation() {
    let schema = shop_schema();
    let scenario = load_scenario(&fixture("child_first.json")).expect("load child_first.json");
    let err = resolve(&scenario, &schema).expect_err("child first must fail");
    match &err {
        ResolveError::UnresolvedRelation {
            table,
            column,
            parent,
        } => {
            assert_eq!(format!("{table}.{column}"), "orders.user_id");
            assert_eq!(parent, "users");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("orders.user_id"));
}

#[test]
fn emitted_schema_accepts_both_table_forms() {
    let schema = serde_json::to_value(scenario_json_schema()).expect("schema json");
    let compiled = jsonschema::JSONSchema::compile(&schema).expect("compile");
    for name in ["scenario.json", "full.json", "child_first.json"] {
        let text = fs::read_to_string(fixture(name)).expect("read fixture");
        let json: serde_json::Value = serde_json::from_str(&text).expect("json");
        assert!(compiled.is_valid(&json), "{name} should match the schema");
    }
}
