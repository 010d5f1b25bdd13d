//! PostgreSQL storage backends.
//!
//! # Tables
//!
//! - `key_value_store`: one row per key, value kept as text
//! - `tabular_rows`: rows of every logical sheet, addressed by `(sheet, position)`
//!
//! Positional inserts and deletes renumber the affected rows inside a single
//! database transaction that first takes a per-sheet advisory lock. Writers
//! to the same sheet are serialized, so no two rows share a position and no
//! gap is left behind.

use async_trait::async_trait;
use sqlx::types::Json;

use super::{KeyValueStore, Row, StoreError, TabularStore};
use crate::db::DbPool;

/// Key-value store backed by the `key_value_store` table.
#[derive(Debug, Clone)]
pub struct PgKeyValueStore {
    pool: DbPool,
}

impl PgKeyValueStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KeyValueStore for PgKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM key_value_store WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO key_value_store (key, value)
            VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE
            SET value = EXCLUDED.value,
                updated_at = NOW()
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM key_value_store WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        let keys = sqlx::query_scalar::<_, String>("SELECT key FROM key_value_store ORDER BY key")
            .fetch_all(&self.pool)
            .await?;

        Ok(keys)
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: &str,
    ) -> Result<bool, StoreError> {
        let result = match expected {
            // Insert-if-absent: the primary key turns a concurrent insert into a no-op
            None => {
                sqlx::query(
                    "INSERT INTO key_value_store (key, value) VALUES ($1, $2) ON CONFLICT (key) DO NOTHING",
                )
                .bind(key)
                .bind(new)
                .execute(&self.pool)
                .await?
            }
            Some(expected) => {
                sqlx::query(
                    r#"
                    UPDATE key_value_store
                    SET value = $3,
                        updated_at = NOW()
                    WHERE key = $1 AND value = $2
                    "#,
                )
                .bind(key)
                .bind(expected)
                .bind(new)
                .execute(&self.pool)
                .await?
            }
        };

        Ok(result.rows_affected() == 1)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Tabular store backed by the `tabular_rows` table.
///
/// Several logical sheets can share the table; each store instance only
/// touches rows of its own `sheet`.
#[derive(Debug, Clone)]
pub struct PgTabularStore {
    pool: DbPool,
    sheet: String,
}

impl PgTabularStore {
    pub fn new(pool: DbPool, sheet: impl Into<String>) -> Self {
        Self {
            pool,
            sheet: sheet.into(),
        }
    }

    /// Serialize positional writers of this sheet until the transaction ends.
    ///
    /// Row shifts under READ COMMITTED cannot see rows inserted by a
    /// concurrent transaction, so without this two appends can both land at
    /// the same position.
    async fn lock_sheet(&self, tx: &mut sqlx::PgConnection) -> Result<(), StoreError> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(&self.sheet)
            .execute(tx)
            .await?;

        Ok(())
    }

    async fn last_position<'e, E>(&self, executor: E) -> Result<usize, StoreError>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let last: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(position), 0) FROM tabular_rows WHERE sheet = $1",
        )
        .bind(&self.sheet)
        .fetch_one(executor)
        .await?;

        Ok(last as usize)
    }
}

#[async_trait]
impl TabularStore for PgTabularStore {
    async fn insert_row(&self, at_index: usize, row: Row) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        self.lock_sheet(&mut tx).await?;

        let last = self.last_position(&mut *tx).await?;
        if at_index == 0 || at_index > last + 1 {
            tx.rollback().await?;
            return Err(StoreError::RowOutOfRange {
                index: at_index,
                last,
            });
        }

        // Make room at the target position
        sqlx::query(
            "UPDATE tabular_rows SET position = position + 1 WHERE sheet = $1 AND position >= $2",
        )
        .bind(&self.sheet)
        .bind(at_index as i64)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO tabular_rows (sheet, position, cells) VALUES ($1, $2, $3)")
            .bind(&self.sheet)
            .bind(at_index as i64)
            .bind(Json(&row))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_all_rows(&self) -> Result<Vec<Row>, StoreError> {
        let rows = sqlx::query_scalar::<_, Json<Row>>(
            "SELECT cells FROM tabular_rows WHERE sheet = $1 ORDER BY position",
        )
        .bind(&self.sheet)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|Json(row)| row).collect())
    }

    async fn delete_rows(&self, from_index: usize, count: usize) -> Result<(), StoreError> {
        if from_index == 0 {
            let last = self.last_row_index().await?;
            return Err(StoreError::RowOutOfRange {
                index: from_index,
                last,
            });
        }
        if count == 0 {
            return Ok(());
        }

        let from = from_index as i64;
        let until = from.saturating_add(count as i64);

        let mut tx = self.pool.begin().await?;
        self.lock_sheet(&mut tx).await?;

        sqlx::query("DELETE FROM tabular_rows WHERE sheet = $1 AND position >= $2 AND position < $3")
            .bind(&self.sheet)
            .bind(from)
            .bind(until)
            .execute(&mut *tx)
            .await?;

        // Close the gap left by the deleted range
        sqlx::query(
            "UPDATE tabular_rows SET position = position - $3 WHERE sheet = $1 AND position >= $2",
        )
        .bind(&self.sheet)
        .bind(until)
        .bind(count as i64)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn last_row_index(&self) -> Result<usize, StoreError> {
        self.last_position(&self.pool).await
    }
}
