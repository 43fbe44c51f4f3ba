use provisioner_core::{Column, SchemaModel, Table};

use crate::errors::{ResolveError, ValidationIssue};
use crate::model::{RelationRef, Scenario};

/// Scenario bound to a schema: tables in the order given, relations bound
/// to parent primary keys.
#[derive(Debug, Clone)]
pub struct ResolvedScenario<'a> {
    pub tables: Vec<ResolvedTable<'a>>,
    /// Disagreements between scenario relations and declared foreign keys.
    pub warnings: Vec<ValidationIssue>,
}

impl<'a> ResolvedScenario<'a> {
    /// Rows the pass will insert; saturates instead of overflowing.
    pub fn total_rows(&self) -> u64 {
        self.tables
            .iter()
            .fold(0u64, |total, table| total.saturating_add(table.count))
    }

    pub fn table_order(&self) -> Vec<String> {
        self.tables
            .iter()
            .map(|resolved| resolved.table.name.clone())
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedTable<'a> {
    pub table: &'a Table,
    pub count: u64,
    pub relations: Vec<ResolvedRelation<'a>>,
}

impl<'a> ResolvedTable<'a> {
    pub fn relation_for(&self, column: &str) -> Option<&ResolvedRelation<'a>> {
        self.relations
            .iter()
            .find(|relation| relation.column.name.eq_ignore_ascii_case(column))
    }

    /// Columns the value generator fills: insertable and not relation-bound.
    pub fn generated_columns(&self) -> impl Iterator<Item = &'a Column> + '_ {
        self.table
            .columns
            .iter()
            .filter(move |column| column.is_insertable() && self.relation_for(&column.name).is_none())
    }
}

/// A child column bound to the primary key of an earlier table.
#[derive(Debug, Clone)]
pub struct ResolvedRelation<'a> {
    pub column: &'a Column,
    pub parent: &'a Table,
    /// Index of the parent in `ResolvedScenario::tables`.
    pub parent_index: usize,
}

/// Bind a scenario to a schema.
///
/// Order is taken as given: a relation may only point at a table listed
/// earlier. Nothing is reordered.
pub fn resolve<'a>(
    scenario: &Scenario,
    schema: &'a SchemaModel,
) -> Result<ResolvedScenario<'a>, ResolveError> {
    let mut resolved: Vec<ResolvedTable<'a>> = Vec::with_capacity(scenario.tables.len());

    for entry in &scenario.tables {
        let table = schema
            .table(&entry.table)
            .ok_or_else(|| ResolveError::UnknownTable {
                table: entry.table.clone(),
            })?;
        if resolved.iter().any(|done| done.table.name == table.name) {
            return Err(ResolveError::DuplicateTable {
                table: entry.table.clone(),
            });
        }

        let mut relations = Vec::with_capacity(entry.relations.len());
        for (column_name, raw) in &entry.relations {
            let invalid = |reason: String| ResolveError::InvalidRelation {
                table: table.name.clone(),
                column: column_name.clone(),
                reason,
            };
            let target = RelationRef::parse(raw)
                .ok_or_else(|| invalid(format!("`{raw}` is not of the form parentTable.parentColumn")))?;

            let column = table
                .column(column_name)
                .ok_or_else(|| ResolveError::UnknownColumn {
                    table: table.name.clone(),
                    column: column_name.clone(),
                })?;
            if table.is_primary_key(&column.name) || column.is_auto_increment {
                return Err(invalid("the primary key cannot be relation-bound".to_string()));
            }
            if column.generated.is_some() {
                return Err(invalid("generated columns cannot be relation-bound".to_string()));
            }

            let parent_index = resolved
                .iter()
                .position(|done| done.table.name == target.table)
                .ok_or_else(|| ResolveError::UnresolvedRelation {
                    table: table.name.clone(),
                    column: column.name.clone(),
                    parent: target.table.clone(),
                })?;
            let parent = resolved[parent_index].table;

            let parent_column =
                parent
                    .column(&target.column)
                    .ok_or_else(|| ResolveError::UnknownColumn {
                        table: parent.name.clone(),
                        column: target.column.clone(),
                    })?;
            if !parent.is_primary_key(&parent_column.name) {
                return Err(ResolveError::RelationTargetNotPrimaryKey {
                    table: table.name.clone(),
                    column: column.name.clone(),
                    parent: parent.name.clone(),
                    parent_column: parent_column.name.clone(),
                });
            }

            relations.push(ResolvedRelation {
                column,
                parent,
                parent_index,
            });
        }

        resolved.push(ResolvedTable {
            table,
            count: entry.count,
            relations,
        });
    }

    let warnings = cross_check_foreign_keys(&resolved);
    Ok(ResolvedScenario {
        tables: resolved,
        warnings,
    })
}

/// Compare scenario relations with foreign keys declared in the DDL.
///
/// The scenario is authoritative; disagreements are reported, never fatal.
fn cross_check_foreign_keys(tables: &[ResolvedTable<'_>]) -> Vec<ValidationIssue> {
    let mut warnings = Vec::new();

    for resolved in tables {
        let table = resolved.table;

        for relation in &resolved.relations {
            let path = format!("/tables/{}/relations/{}", table.name, relation.column.name);
            let binding = format!(
                "{}.{}",
                relation.parent.name, relation.parent.primary_key
            );
            match table.foreign_key_for(&relation.column.name) {
                Some((fk, target))
                    if fk.referenced_table != relation.parent.name
                        || !relation.parent.is_primary_key(target) =>
                {
                    warnings.push(ValidationIssue::warning(
                        "relation_fk_mismatch",
                        path,
                        format!(
                            "`{}.{}` is bound to `{binding}` but its foreign key references `{}.{target}`",
                            table.name, relation.column.name, fk.referenced_table
                        ),
                        Some("the scenario relation is used for generation".to_string()),
                    ));
                }
                Some(_) => {}
                None => warnings.push(ValidationIssue::warning(
                    "relation_without_fk",
                    path,
                    format!(
                        "`{}.{}` is bound to `{binding}` but declares no foreign key",
                        table.name, relation.column.name
                    ),
                    None,
                )),
            }
        }

        for column in resolved.generated_columns() {
            if let Some((fk, target)) = table.foreign_key_for(&column.name) {
                warnings.push(ValidationIssue::warning(
                    "fk_without_relation",
                    format!("/tables/{}", table.name),
                    format!(
                        "`{}.{}` references `{}.{target}` but has no scenario relation; random values will likely violate the key",
                        table.name, column.name, fk.referenced_table
                    ),
                    Some(format!(
                        "add \"{}\": \"{}.{target}\" to the relations of `{}`",
                        column.name, fk.referenced_table, table.name
                    )),
                ));
            }
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use provisioner_core::parse_ddl;

    const DDL: &str = "
        CREATE TABLE users (id INT AUTO_INCREMENT PRIMARY KEY, email VARCHAR(40) NOT NULL);
        CREATE TABLE orders (
            id INT AUTO_INCREMENT PRIMARY KEY,
            user_id INT NOT NULL,
            reviewer_id INT NULL,
            FOREIGN KEY (user_id) REFERENCES users (id)
        );";

    fn scenario(json: &str) -> Scenario {
        serde_json::from_str(json).expect("scenario json")
    }

    #[test]
    fn binds_relations_to_earlier_tables() {
        let schema = parse_ddl(DDL).expect("ddl");
        let scenario = scenario(
            r#"{"tables": {"users": {"count": 2},
                "orders": {"count": 3, "relations": {"user_id": "users.id"}}}}"#,
        );
        let resolved = resolve(&scenario, &schema).expect("resolve");
        assert_eq!(resolved.table_order(), vec!["users", "orders"]);
        assert_eq!(resolved.total_rows(), 5);

        let orders = &resolved.tables[1];
        let relation = orders.relation_for("user_id").expect("relation");
        assert_eq!(relation.parent.name, "users");
        assert_eq!(relation.parent_index, 0);

        let generated: Vec<&str> = orders.generated_columns().map(|c| c.name.as_str()).collect();
        assert_eq!(generated, vec!["reviewer_id"]);
        assert!(resolved.warnings.is_empty());
    }

    #[test]
    fn huge_counts_saturate_the_total() {
        let schema = parse_ddl(DDL).expect("ddl");
        let scenario = scenario(
            r#"{"tables": {"users": {"count": 18446744073709551615},
                "orders": {"count": 3, "relations": {"user_id": "users.id"}}}}"#,
        );
        assert_eq!(scenario.total_rows(), u64::MAX);
        let resolved = resolve(&scenario, &schema).expect("resolve");
        assert_eq!(resolved.total_rows(), u64::MAX);
    }

    #[test]
    fn child_before_parent_is_unresolved() {
        let schema = parse_ddl(DDL).expect("ddl");
        let scenario = scenario(
            r#"{"tables": {"orders": {"count": 3, "relations": {"user_id": "users.id"}},
                "users": {"count": 2}}}"#,
        );
        let err = resolve(&scenario, &schema).expect_err("should fail");
        assert_eq!(
            err,
            ResolveError::UnresolvedRelation {
                table: "orders".to_string(),
                column: "user_id".to_string(),
                parent: "users".to_string(),
            }
        );
    }

    #[test]
    fn self_reference_is_unresolved() {
        let schema = parse_ddl(DDL).expect("ddl");
        let scenario = scenario(
            r#"{"tables": {"orders": {"count": 3, "relations": {"reviewer_id": "orders.id"}}}}"#,
        );
        let err = resolve(&scenario, &schema).expect_err("should fail");
        assert!(matches!(err, ResolveError::UnresolvedRelation { .. }));
    }

    #[test]
    fn rejects_unknown_and_duplicate_tables() {
        let schema = parse_ddl(DDL).expect("ddl");
        let err = resolve(&scenario(r#"{"tables": {"ghosts": {"count": 1}}}"#), &schema)
            .expect_err("unknown");
        assert!(matches!(err, ResolveError::UnknownTable { .. }));

        let err = resolve(
            &scenario(r#"{"tables": [{"table": "users", "count": 1}, {"table": "users", "count": 2}]}"#),
            &schema,
        )
        .expect_err("duplicate");
        assert!(matches!(err, ResolveError::DuplicateTable { .. }));
    }

    #[test]
    fn rejects_bad_relation_targets() {
        let schema = parse_ddl(DDL).expect("ddl");
        let cases = [
            (r#"{"user_id": "users"}"#, "invalid"),
            (r#"{"missing": "users.id"}"#, "unknown column"),
            (r#"{"id": "users.id"}"#, "invalid"),
            (r#"{"user_id": "users.email"}"#, "not pk"),
        ];
        for (relations, label) in cases {
            let json = format!(
                r#"{{"tables": {{"users": {{"count": 1}}, "orders": {{"count": 1, "relations": {relations}}}}}}}"#
            );
            let err = resolve(&scenario(&json), &schema).expect_err(label);
            let matched = match label {
                "invalid" => matches!(err, ResolveError::InvalidRelation { .. }),
                "unknown column" => matches!(err, ResolveError::UnknownColumn { .. }),
                _ => matches!(err, ResolveError::RelationTargetNotPrimaryKey { .. }),
            };
            assert!(matched, "{label}: {err}");
        }
    }

    #[test]
    fn warns_when_foreign_keys_and_relations_disagree() {
        let schema = parse_ddl(DDL).expect("ddl");
        let scenario = scenario(
            r#"{"tables": {"users": {"count": 1}, "orders": {"count": 1}}}"#,
        );
        let resolved = resolve(&scenario, &schema).expect("resolve");
        let codes: Vec<&str> = resolved.warnings.iter().map(|w| w.code.as_str()).collect();
        assert_eq!(codes, vec!["fk_without_relation"]);

        let scenario = scenario_with_reviewer();
        let resolved = resolve(&scenario, &schema).expect("resolve");
        let codes: Vec<&str> = resolved.warnings.iter().map(|w| w.code.as_str()).collect();
        assert_eq!(codes, vec!["relation_without_fk"]);
    }

    fn scenario_with_reviewer() -> Scenario {
        scenario(
            r#"{"tables": {"users": {"count": 1},
                "orders": {"count": 1, "relations": {"user_id": "users.id", "reviewer_id": "users.id"}}}}"#,
        )
    }
}
