use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use provisioner_core::{GeneratedValue, SchemaModel};

use crate::adapter::RowStore;
use crate::error::{DbError, DbResult};

/// In-process row store used by `--dry-run` and tests.
///
/// Built with [`MemoryStore::for_schema`], it enforces the schema's declared
/// single-column foreign keys the way InnoDB would: inserts must reference
/// an existing parent row and parents cannot be deleted while referenced.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    links: Vec<Link>,
}

#[derive(Debug, Default)]
struct State {
    tables: BTreeMap<String, MemoryTable>,
    inserts: u64,
    fail_inserts_after: Option<u64>,
    fail_next_deletes: u32,
    insert_delay: Option<Duration>,
}

#[derive(Debug, Default)]
struct MemoryTable {
    next_id: u64,
    rows: BTreeMap<u64, BTreeMap<String, GeneratedValue>>,
}

#[derive(Debug, Clone)]
struct Link {
    child_table: String,
    child_column: String,
    parent_table: String,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_schema(schema: &SchemaModel) -> Self {
        let links = schema
            .tables
            .iter()
            .flat_map(|table| {
                table.foreign_keys.iter().filter_map(move |fk| match fk.columns.as_slice() {
                    [column] => Some(Link {
                        child_table: table.name.clone(),
                        child_column: column.clone(),
                        parent_table: fk.referenced_table.clone(),
                    }),
                    _ => None,
                })
            })
            .collect();
        Self {
            state: Mutex::default(),
            links,
        }
    }

    /// Fail every insert after the first `count` successful ones.
    pub async fn fail_inserts_after(&self, count: u64) {
        self.state.lock().await.fail_inserts_after = Some(count);
    }

    /// Fail the next `count` deletes with an injected error.
    pub async fn fail_next_deletes(&self, count: u32) {
        self.state.lock().await.fail_next_deletes = count;
    }

    /// Sleep before completing each insert.
    pub async fn set_insert_delay(&self, delay: Duration) {
        self.state.lock().await.insert_delay = Some(delay);
    }

    /// Remove a row behind the provisioner's back.
    pub async fn remove_external(&self, table: &str, pk: u64) -> bool {
        let mut state = self.state.lock().await;
        state
            .tables
            .get_mut(table)
            .is_some_and(|rows| rows.rows.remove(&pk).is_some())
    }

    pub async fn row_ids(&self, table: &str) -> Vec<u64> {
        let state = self.state.lock().await;
        state
            .tables
            .get(table)
            .map(|rows| rows.rows.keys().copied().collect())
            .unwrap_or_default()
    }

    pub async fn value(&self, table: &str, pk: u64, column: &str) -> Option<GeneratedValue> {
        let state = self.state.lock().await;
        state.tables.get(table)?.rows.get(&pk)?.get(column).cloned()
    }

    fn check_parents(
        &self,
        state: &State,
        table: &str,
        columns: &[&str],
        values: &[GeneratedValue],
    ) -> DbResult<()> {
        for link in self.links.iter().filter(|link| link.child_table == table) {
            let Some(position) = columns
                .iter()
                .position(|column| column.eq_ignore_ascii_case(&link.child_column))
            else {
                continue;
            };
            let referenced = match values.get(position) {
                Some(GeneratedValue::Int(id)) => u64::try_from(*id).ok(),
                _ => continue,
            };
            let exists = referenced.is_some_and(|id| {
                state
                    .tables
                    .get(&link.parent_table)
                    .is_some_and(|parent| parent.rows.contains_key(&id))
            });
            if !exists {
                return Err(DbError::ForeignKeyViolation(format!(
                    "`{table}.{}` references a missing `{}` row",
                    link.child_column, link.parent_table
                )));
            }
        }
        Ok(())
    }

    fn check_children(&self, state: &State, table: &str, pk: u64) -> DbResult<()> {
        for link in self.links.iter().filter(|link| link.parent_table == table) {
            let Some(children) = state.tables.get(&link.child_table) else {
                continue;
            };
            let referenced = children.rows.values().any(|row| {
                row.get(&link.child_column)
                    .and_then(GeneratedValue::as_i64)
                    .is_some_and(|id| id >= 0 && id as u64 == pk)
            });
            if referenced {
                return Err(DbError::ForeignKeyViolation(format!(
                    "`{table}` row {pk} is still referenced by `{}.{}`",
                    link.child_table, link.child_column
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RowStore for MemoryStore {
    fn engine(&self) -> &'static str {
        "memory"
    }

    async fn insert_row(
        &self,
        table: &str,
        columns: &[&str],
        values: &[GeneratedValue],
    ) -> DbResult<u64> {
        if columns.len() != values.len() {
            return Err(DbError::Unsupported(format!(
                "{} columns but {} values for `{table}`",
                columns.len(),
                values.len()
            )));
        }

        let delay = self.state.lock().await.insert_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().await;
        if state
            .fail_inserts_after
            .is_some_and(|limit| state.inserts >= limit)
        {
            return Err(DbError::Injected(format!("insert into `{table}` refused")));
        }
        self.check_parents(&state, table, columns, values)?;

        state.inserts += 1;
        let rows = state.tables.entry(table.to_string()).or_default();
        rows.next_id += 1;
        let id = rows.next_id;
        let row = columns
            .iter()
            .map(|column| column.to_string())
            .zip(values.iter().cloned())
            .collect();
        rows.rows.insert(id, row);
        Ok(id)
    }

    async fn delete_row(&self, table: &str, _pk_column: &str, pk: u64) -> DbResult<bool> {
        let mut state = self.state.lock().await;
        if state.fail_next_deletes > 0 {
            state.fail_next_deletes -= 1;
            return Err(DbError::Injected(format!("delete from `{table}` refused")));
        }
        if !state
            .tables
            .get(table)
            .is_some_and(|rows| rows.rows.contains_key(&pk))
        {
            return Ok(false);
        }
        self.check_children(&state, table, pk)?;
        Ok(state
            .tables
            .get_mut(table)
            .is_some_and(|rows| rows.rows.remove(&pk).is_some()))
    }

    async fn count_rows(&self, table: &str) -> DbResult<u64> {
        let state = self.state.lock().await;
        Ok(state
            .tables
            .get(table)
            .map(|rows| rows.rows.len() as u64)
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provisioner_core::parse_ddl;

    fn linked_store() -> MemoryStore {
        let schema = parse_ddl(
            "CREATE TABLE users (id INT AUTO_INCREMENT PRIMARY KEY);
             CREATE TABLE orders (id INT AUTO_INCREMENT PRIMARY KEY, user_id INT,
               FOREIGN KEY (user_id) REFERENCES users (id));",
        )
        .expect("ddl");
        MemoryStore::for_schema(&schema)
    }

    #[tokio::test]
    async fn assigns_increasing_identities() {
        let store = MemoryStore::new();
        let first = store.insert_row("t", &[], &[]).await.expect("insert");
        let second = store.insert_row("t", &[], &[]).await.expect("insert");
        assert_eq!((first, second), (1, 2));
        assert_eq!(store.count_rows("t").await.expect("count"), 2);
        assert_eq!(store.count_rows("missing").await.expect("count"), 0);
    }

    #[tokio::test]
    async fn enforces_declared_foreign_keys() {
        let store = linked_store();
        let orphan = store
            .insert_row("orders", &["user_id"], &[GeneratedValue::Int(7)])
            .await;
        assert!(matches!(orphan, Err(DbError::ForeignKeyViolation(_))));

        let user = store.insert_row("users", &[], &[]).await.expect("user");
        let order = store
            .insert_row("orders", &["user_id"], &[GeneratedValue::Int(user as i64)])
            .await
            .expect("order");

        let blocked = store.delete_row("users", "id", user).await;
        assert!(matches!(blocked, Err(DbError::ForeignKeyViolation(_))));

        assert!(store.delete_row("orders", "id", order).await.expect("delete"));
        assert!(store.delete_row("users", "id", user).await.expect("delete"));
        assert!(!store.delete_row("users", "id", user).await.expect("delete"));
    }

    #[tokio::test]
    async fn null_references_are_allowed() {
        let store = linked_store();
        store
            .insert_row("orders", &["user_id"], &[GeneratedValue::Null])
            .await
            .expect("null reference");
    }

    #[tokio::test]
    async fn injected_faults_fire() {
        let store = MemoryStore::new();
        store.fail_inserts_after(1).await;
        store.insert_row("t", &[], &[]).await.expect("first insert");
        assert!(matches!(
            store.insert_row("t", &[], &[]).await,
            Err(DbError::Injected(_))
        ));

        store.fail_next_deletes(1).await;
        assert!(store.delete_row("t", "id", 1).await.is_err());
        assert!(store.delete_row("t", "id", 1).await.expect("second delete"));
    }
}
