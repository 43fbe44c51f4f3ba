use provisioner_core::{ColumnKind, SchemaModel, parse_ddl};
use std::fs;
use std::path::Path;

fn load_shop() -> SchemaModel {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures/shop/schema.sql");
    let sql = fs::read_to_string(&path)
        .unwrap_or_else(|_| panic!("missing schema at {}", path.display()));
    parse_ddl(&sql).expect("parse shop schema")
}

#[test]
fn shop_fixture_parses_every_table() {
    let model = load_shop();
    let names: Vec<&str> = model.table_names().collect();
    assert_eq!(names, vec!["users", "products", "orders", "order_items"]);

    let products = model.table("products").expect("products");
    assert_eq!(products.primary_key, "id");
    assert_eq!(
        products.column("release_year").expect("year").kind,
        ColumnKind::Integer {
            min: 1901,
            max: 2155
        }
    );
    assert_eq!(products.column("attributes").expect("json").kind, ColumnKind::Json);
    assert_eq!(products.column("weight_kg").expect("double").kind, ColumnKind::Float);

    let items = model.table("order_items").expect("order_items");
    assert_eq!(items.foreign_keys.len(), 2);
}

#[test]
fn rendering_reparses_to_same_kinds_and_nullability() {
    let model = load_shop();
    let rendered = model.to_ddl();
    let reparsed = parse_ddl(&rendered).expect("reparse rendered ddl");

    assert_eq!(model.tables.len(), reparsed.tables.len());
    for (original, again) in model.tables.iter().zip(&reparsed.tables) {
        assert_eq!(original.name, again.name);
        assert_eq!(original.primary_key, again.primary_key);
        assert_eq!(original.columns.len(), again.columns.len());
        for (left, right) in original.columns.iter().zip(&again.columns) {
            assert_eq!(left.name, right.name);
            assert_eq!(left.kind, right.kind, "kind of {}.{}", original.name, left.name);
            assert_eq!(
                left.is_nullable, right.is_nullable,
                "nullability of {}.{}",
                original.name, left.name
            );
        }
    }
    assert_eq!(model.fingerprint(), reparsed.fingerprint());
}

#[test]
fn fingerprint_ignores_formatting_but_tracks_content() {
    let compact = "CREATE TABLE t (id INT AUTO_INCREMENT PRIMARY KEY, name VARCHAR(10))";
    let spaced = "create table `t` (\n  `id` int   auto_increment,\n  `name` varchar(10),\n  primary key (`id`)\n);";
    let changed = "CREATE TABLE t (id INT AUTO_INCREMENT PRIMARY KEY, name VARCHAR(11))";

    let compact = parse_ddl(compact).expect("compact");
    let spaced = parse_ddl(spaced).expect("spaced");
    let changed = parse_ddl(changed).expect("changed");

    assert_eq!(compact.fingerprint(), spaced.fingerprint());
    assert_ne!(compact.fingerprint(), changed.fingerprint());
}

#[test]
fn model_serializes_with_tagged_kinds() {
    let model = parse_ddl("CREATE TABLE t (id INT AUTO_INCREMENT PRIMARY KEY)").expect("parse");
    let json = serde_json::to_value(&model).expect("serialize");
    assert_eq!(json["tables"][0]["columns"][0]["kind"]["kind"], "integer");
    let back: SchemaModel = serde_json::from_value(json).expect("deserialize");
    assert_eq!(back, model);
}
