//! In-memory storage backends.
//!
//! Used by the test suite and by `STORAGE_BACKEND=memory`. Nothing survives a
//! restart.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{KeyValueStore, Row, StoreError, TabularStore};

#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: &str,
    ) -> Result<bool, StoreError> {
        let mut entries = self.entries.write().await;

        if entries.get(key).map(String::as_str) != expected {
            return Ok(false);
        }

        entries.insert(key.to_string(), new.to_string());
        Ok(true)
    }
}

#[derive(Debug, Default)]
pub struct MemoryTabularStore {
    rows: RwLock<Vec<Row>>,
}

impl MemoryTabularStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TabularStore for MemoryTabularStore {
    async fn insert_row(&self, at_index: usize, row: Row) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        let last = rows.len();

        if at_index == 0 || at_index > last + 1 {
            return Err(StoreError::RowOutOfRange {
                index: at_index,
                last,
            });
        }

        rows.insert(at_index - 1, row);
        Ok(())
    }

    async fn get_all_rows(&self) -> Result<Vec<Row>, StoreError> {
        Ok(self.rows.read().await.clone())
    }

    async fn delete_rows(&self, from_index: usize, count: usize) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        let last = rows.len();

        if from_index == 0 {
            return Err(StoreError::RowOutOfRange {
                index: from_index,
                last,
            });
        }

        let start = (from_index - 1).min(last);
        let end = start.saturating_add(count).min(last);
        rows.drain(start..end);
        Ok(())
    }

    async fn last_row_index(&self) -> Result<usize, StoreError> {
        Ok(self.rows.read().await.len())
    }
}
