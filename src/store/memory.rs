use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;

use super::Store;

/// Keeps every table in memory. Used in tests and for dry runs.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    tables: HashMap<String, BTreeMap<String, serde_json::Value>>,
    writes: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self, name: &str) -> Option<&BTreeMap<String, serde_json::Value>> {
        self.tables.get(name)
    }

    /// Number of records in the table, zero if it doesn't exist.
    pub fn len(&self, name: &str) -> usize {
        self.tables.get(name).map_or(0, BTreeMap::len)
    }

    /// Total number of `set_value` calls so far.
    pub fn writes(&self) -> u64 {
        self.writes
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_value(
        &self,
        table: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, anyhow::Error> {
        Ok(self
            .tables
            .get(table)
            .and_then(|records| records.get(key))
            .cloned())
    }

    async fn set_value(
        &mut self,
        table: &str,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), anyhow::Error> {
        self.writes += 1;
        self.tables
            .entry(table.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }
}
