use sqlx::mysql::{MySqlArguments, MySqlConnectOptions, MySqlPoolOptions};
use sqlx::query::Query;
use sqlx::{MySql, MySqlPool};

use provisioner_core::{GeneratedValue, quote_ident};

use crate::adapter::RowStore;
use crate::error::DbResult;
use crate::options::ConnectionOptions;

/// Row store backed by a MySQL connection pool.
#[derive(Debug, Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    /// Create a new store using a pre-configured pool.
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Open a pool for `options`.
    pub async fn connect(options: &ConnectionOptions) -> DbResult<Self> {
        let mut connect = MySqlConnectOptions::new()
            .host(options.tcp_host())
            .port(options.port)
            .username(&options.user)
            .database(&options.database);
        if let Some(password) = &options.password {
            connect = connect.password(password);
        }

        let pool = MySqlPoolOptions::new()
            .max_connections(options.max_connections)
            .acquire_timeout(options.connect_timeout)
            .connect_with(connect)
            .await?;

        tracing::info!(
            event = "store_connected",
            url = %options.display_url(),
            "connected to mysql"
        );
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl RowStore for MySqlStore {
    fn engine(&self) -> &'static str {
        "mysql"
    }

    async fn insert_row(
        &self,
        table: &str,
        columns: &[&str],
        values: &[GeneratedValue],
    ) -> DbResult<u64> {
        let sql = insert_statement(table, columns);
        let mut query = sqlx::query(&sql);
        for value in values {
            query = bind_value(query, value);
        }
        let result = query.execute(&self.pool).await?;
        Ok(result.last_insert_id())
    }

    async fn delete_row(&self, table: &str, pk_column: &str, pk: u64) -> DbResult<bool> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?",
            quote_ident(table),
            quote_ident(pk_column)
        );
        let result = sqlx::query(&sql).bind(pk).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_rows(&self, table: &str) -> DbResult<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
        let count = sqlx::query_scalar::<_, i64>(&sql)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }
}

fn insert_statement(table: &str, columns: &[&str]) -> String {
    let names = columns
        .iter()
        .map(|column| quote_ident(column))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = vec!["?"; columns.len()].join(", ");
    format!(
        "INSERT INTO {} ({names}) VALUES ({placeholders})",
        quote_ident(table)
    )
}

fn bind_value<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    value: &'q GeneratedValue,
) -> Query<'q, MySql, MySqlArguments> {
    match value {
        GeneratedValue::Null => query.bind(None::<String>),
        GeneratedValue::Bool(value) => query.bind(*value),
        GeneratedValue::Int(value) => query.bind(*value),
        GeneratedValue::Float(value) => query.bind(*value),
        // MySQL converts decimal and JSON text on assignment
        GeneratedValue::Decimal(text) | GeneratedValue::Text(text) | GeneratedValue::Json(text) => {
            query.bind(text.as_str())
        }
        GeneratedValue::Date(value) => query.bind(*value),
        GeneratedValue::DateTime(value) => query.bind(*value),
        GeneratedValue::Time(value) => query.bind(*value),
    }
}
