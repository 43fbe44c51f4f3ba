use anyhow::{Context, Result};
use provisioner_core::GeneratedValue;
use provisioner_db::{MySqlStore, RowStore};
use sqlx::mysql::MySqlPoolOptions;
use std::env;

const TABLE: &str = "provisioner_store_probe";

fn database_url() -> Option<String> {
    env::var("TEST_DATABASE_URL").ok()
}

#[tokio::test]
async fn inserts_and_deletes_by_identity() -> Result<()> {
    let Some(db_url) = database_url() else {
        eprintln!("TEST_DATABASE_URL not set; skipping mysql store test");
        return Ok(());
    };
    let pool = MySqlPoolOptions::new()
        .max_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(10))
        .connect(&db_url)
        .await
        .context("connecting to MySQL")?;

    sqlx::query(&format!("DROP TABLE IF EXISTS {TABLE}"))
        .execute(&pool)
        .await
        .context("dropping probe table")?;
    sqlx::query(&format!(
        "CREATE TABLE {TABLE} (id INT AUTO_INCREMENT PRIMARY KEY, label VARCHAR(12) NULL, amount DECIMAL(6,2) NOT NULL)"
    ))
    .execute(&pool)
    .await
    .context("creating probe table")?;

    let store = MySqlStore::new(pool.clone());
    let first = store
        .insert_row(
            TABLE,
            &["label", "amount"],
            &[
                GeneratedValue::Text("probe".to_string()),
                GeneratedValue::Decimal("12.50".to_string()),
            ],
        )
        .await
        .context("inserting first row")?;
    let second = store
        .insert_row(
            TABLE,
            &["label", "amount"],
            &[GeneratedValue::Null, GeneratedValue::Decimal("0.99".to_string())],
        )
        .await
        .context("inserting second row")?;
    assert!(second > first);
    assert_eq!(store.count_rows(TABLE).await?, 2);

    assert!(store.delete_row(TABLE, "id", second).await?);
    assert!(!store.delete_row(TABLE, "id", second).await?);
    assert!(store.delete_row(TABLE, "id", first).await?);
    assert_eq!(store.count_rows(TABLE).await?, 0);

    sqlx::query(&format!("DROP TABLE {TABLE}"))
        .execute(&pool)
        .await
        .context("dropping probe table")?;
    Ok(())
}
