use std::str::FromStr;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Sqlite,
};

use super::Store;

/// Stores every table in a single SQLite `kv_store` table,
/// one row per `(table_name, key)` with the record as JSON text.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Opens (creating if missing) the database at `database_url`,
    /// e.g. `sqlite:allowances.db` or `sqlite::memory:`.
    pub async fn connect(database_url: &str) -> Result<Self, anyhow::Error> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL: {}", database_url))?
            .create_if_missing(true);
        // A single connection that never expires, so an in-memory
        // database lives as long as the store.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: Pool<Sqlite>) -> Result<Self, anyhow::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv_store (
                table_name TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (table_name, key)
            )
            "#,
        )
        .execute(&pool)
        .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn get_value(
        &self,
        table: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, anyhow::Error> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM kv_store WHERE table_name = ? AND key = ?")
                .bind(table)
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        value
            .map(|value| serde_json::from_str(&value))
            .transpose()
            .with_context(|| format!("Malformed JSON for {} in {}", key, table))
    }

    async fn set_value(
        &mut self,
        table: &str,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), anyhow::Error> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (table_name, key, value) VALUES (?, ?, ?)
            ON CONFLICT (table_name, key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(table)
        .bind(key)
        .bind(value.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn upserts_and_reads_back() {
        let mut store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        assert_eq!(store.get_value("balances", "0xabc").await.unwrap(), None);

        store
            .set_value("balances", "0xabc", json!({"balance": "10"}))
            .await
            .unwrap();
        store
            .set_value("balances", "0xabc", json!({"balance": "-5"}))
            .await
            .unwrap();
        store
            .set_value("allowances", "0xabc", json!({"allowance": "1"}))
            .await
            .unwrap();

        assert_eq!(
            store.get_value("balances", "0xabc").await.unwrap(),
            Some(json!({"balance": "-5"}))
        );
        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM kv_store")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(rows, 2);
    }
}
