//! Storage collaborators behind the key store and the audit log.
//!
//! Two narrow interfaces are defined here:
//! - [`KeyValueStore`]: one value per key, backs API key records
//! - [`TabularStore`]: ordered rows addressed by 1-based index, backs the audit log
//!
//! Each has an in-memory implementation (tests, local runs) and a PostgreSQL
//! implementation built on the shared sqlx pool.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

pub use memory::{MemoryKeyValueStore, MemoryTabularStore};
pub use postgres::{PgKeyValueStore, PgTabularStore};

/// One row of a tabular store. Cells are plain strings.
pub type Row = Vec<String>;

/// Errors raised by any storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored value could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Row index outside `1..=last_row_index() + 1`.
    #[error("row index {index} out of range (last row is {last})")]
    RowOutOfRange { index: usize, last: usize },
}

/// Durable string-to-string mapping.
///
/// Last-write-wins for `set`; `compare_and_swap` is the only conditional write
/// and is what callers use when they need read-modify-write consistency.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove `key`. Returns whether a value existed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    async fn keys(&self) -> Result<Vec<String>, StoreError>;

    /// Replace the value of `key` with `new` only if it currently equals `expected`.
    ///
    /// `expected = None` means "only if absent" (insert-if-absent).
    /// Returns `true` when the write happened.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: &str,
    ) -> Result<bool, StoreError>;

    /// Connectivity check used by the health endpoint.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Spreadsheet-like row store with 1-based positional addressing.
#[async_trait]
pub trait TabularStore: Send + Sync {
    /// Insert `row` so that it becomes row `at_index`, shifting later rows down.
    async fn insert_row(&self, at_index: usize, row: Row) -> Result<(), StoreError>;

    /// All rows in positional order, header included.
    async fn get_all_rows(&self) -> Result<Vec<Row>, StoreError>;

    /// Delete `count` rows starting at `from_index`, shifting later rows up.
    async fn delete_rows(&self, from_index: usize, count: usize) -> Result<(), StoreError>;

    /// Index of the last populated row, `0` when the store is empty.
    async fn last_row_index(&self) -> Result<usize, StoreError>;
}
