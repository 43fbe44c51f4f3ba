use async_trait::async_trait;

use provisioner_core::GeneratedValue;

use crate::error::DbResult;

/// Row-level access to the target database.
///
/// Tables always have a single auto-increment key, so an insert reports the
/// identity the store assigned and deletes address rows by that identity.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Returns the engine identifier (e.g. `mysql`).
    fn engine(&self) -> &'static str;

    /// Insert one row and return its assigned primary key.
    async fn insert_row(
        &self,
        table: &str,
        columns: &[&str],
        values: &[GeneratedValue],
    ) -> DbResult<u64>;

    /// Delete the row with primary key `pk`; `false` when nothing matched.
    async fn delete_row(&self, table: &str, pk_column: &str, pk: u64) -> DbResult<bool>;

    async fn count_rows(&self, table: &str) -> DbResult<u64>;
}
