/*!
A minimal key-value store the datalakes write their tables to.

Records are kept as JSON values, grouped in named tables. The typed
[`Table`] wrapper (de)serializes records so handlers work with plain
structs. There is no transaction or rollback support here: reverting
the writes of a dropped block is up to whatever backs the store.
*/

use std::marker::PhantomData;

use anyhow::Context;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

mod memory;
#[cfg(feature = "database")]
mod sqlite;

pub use memory::MemoryStore;
#[cfg(feature = "database")]
pub use sqlite::SqliteStore;

#[async_trait]
pub trait Store: Send + Sync {
    async fn get_value(
        &self,
        table: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, anyhow::Error>;

    /// Inserts the value or replaces the one stored under `key`.
    async fn set_value(
        &mut self,
        table: &str,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), anyhow::Error>;
}

/// A named table holding records of type `R`.
#[derive(Debug)]
pub struct Table<R> {
    name: &'static str,
    _record: PhantomData<fn() -> R>,
}

impl<R> Clone for Table<R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> Copy for Table<R> {}

impl<R> Table<R>
where
    R: Serialize + DeserializeOwned,
{
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _record: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub async fn get(&self, store: &dyn Store, key: &str) -> Result<Option<R>, anyhow::Error> {
        let Some(value) = store.get_value(self.name, key).await? else {
            return Ok(None);
        };
        let record = serde_json::from_value(value)
            .with_context(|| format!("Malformed record {} in table {}", key, self.name))?;
        Ok(Some(record))
    }

    pub async fn set(
        &self,
        store: &mut dyn Store,
        key: &str,
        record: &R,
    ) -> Result<(), anyhow::Error> {
        let value = serde_json::to_value(record)
            .with_context(|| format!("Failed to serialize record {} for {}", key, self.name))?;
        store.set_value(self.name, key, value).await
    }
}

/// The last block a datalake finished, kept in the `meta` table
/// under the datalake id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub datalake_id: String,
    pub last_block_number: u64,
}

pub const CHECKPOINTS: Table<CheckpointRecord> = Table::new("meta");

pub async fn load_checkpoint(
    store: &dyn Store,
    datalake_id: &str,
) -> Result<Option<u64>, anyhow::Error> {
    Ok(CHECKPOINTS
        .get(store, datalake_id)
        .await?
        .map(|record| record.last_block_number))
}

pub async fn save_checkpoint(
    store: &mut dyn Store,
    datalake_id: &str,
    block_number: u64,
) -> Result<(), anyhow::Error> {
    CHECKPOINTS
        .set(
            store,
            datalake_id,
            &CheckpointRecord {
                datalake_id: datalake_id.to_string(),
                last_block_number: block_number,
            },
        )
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Counter {
        name: String,
        count: u64,
    }

    const COUNTERS: Table<Counter> = Table::new("counters");

    #[tokio::test]
    async fn typed_table_round_trip() {
        let mut store = MemoryStore::new();
        assert_eq!(COUNTERS.get(&store, "a").await.unwrap(), None);

        let counter = Counter {
            name: "a".to_string(),
            count: 3,
        };
        COUNTERS.set(&mut store, "a", &counter).await.unwrap();
        assert_eq!(COUNTERS.get(&store, "a").await.unwrap(), Some(counter));
    }

    #[tokio::test]
    async fn malformed_record_is_an_error() {
        let mut store = MemoryStore::new();
        store
            .set_value("counters", "a", serde_json::json!({"name": 1}))
            .await
            .unwrap();
        assert!(COUNTERS.get(&store, "a").await.is_err());
    }

    #[tokio::test]
    async fn checkpoints_are_kept_per_datalake() {
        let mut store = MemoryStore::new();
        assert_eq!(load_checkpoint(&store, "voting").await.unwrap(), None);

        save_checkpoint(&mut store, "voting", 10).await.unwrap();
        save_checkpoint(&mut store, "voting", 12).await.unwrap();
        save_checkpoint(&mut store, "weth-allowances", 3).await.unwrap();

        assert_eq!(load_checkpoint(&store, "voting").await.unwrap(), Some(12));
        assert_eq!(store.len("meta"), 2);
    }
}
