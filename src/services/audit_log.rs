//! Audit log service - append-only, size-capped record of execution attempts.
//!
//! # Layout in the tabular store
//!
//! ```text
//! row 1: Timestamp | Identifier | Title | Script | Result | Status   (header)
//! row 2: newest entry
//! ...
//! row N: oldest entry
//! ```
//!
//! New entries are inserted at row 2. After every insert, entries beyond the
//! configured maximum are deleted from the bottom in a single call.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    models::audit::{AuditStats, LogEntry, LogStatus},
    storage::{Row, StoreError, TabularStore},
};

pub const HEADER: [&str; 6] = ["Timestamp", "Identifier", "Title", "Script", "Result", "Status"];

/// Default cap on stored entries.
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Longest script/result text stored, ellipsis included.
pub const MAX_FIELD_CHARS: usize = 1000;

const ELLIPSIS: &str = "...";
const HEADER_ROW: usize = 1;
const FIRST_ENTRY_ROW: usize = HEADER_ROW + 1;

const COL_TIMESTAMP: usize = 0;
const COL_IDENTIFIER: usize = 1;
const COL_TITLE: usize = 2;
const COL_SCRIPT: usize = 3;
const COL_RESULT: usize = 4;
const COL_STATUS: usize = 5;

pub struct AuditLog {
    store: Arc<dyn TabularStore>,
    max_entries: usize,
}

impl AuditLog {
    /// Open the log on `store`, writing the header if the store is empty.
    ///
    /// A cap of 0 would evict every entry as it is written, so it is raised to 1.
    pub async fn open(store: Arc<dyn TabularStore>, max_entries: usize) -> Result<Self, StoreError> {
        if max_entries == 0 {
            tracing::warn!("audit log cap of 0 raised to 1");
        }

        let log = Self {
            store,
            max_entries: max_entries.max(1),
        };
        log.ensure_header().await?;
        Ok(log)
    }

    /// Insert `entry` as the newest row, then evict overflow.
    pub async fn append(&self, entry: &LogEntry) -> Result<(), StoreError> {
        self.ensure_header().await?;
        self.store.insert_row(FIRST_ENTRY_ROW, to_row(entry)).await?;

        let entries = self.store.last_row_index().await?.saturating_sub(HEADER_ROW);
        if entries > self.max_entries {
            let overflow = entries - self.max_entries;
            self.store
                .delete_rows(FIRST_ENTRY_ROW + self.max_entries, overflow)
                .await?;
            tracing::debug!(evicted = overflow, "audit log trimmed");
        }

        Ok(())
    }

    pub async fn stats(&self) -> Result<AuditStats, StoreError> {
        let (mut success, mut fail) = (0, 0);

        for row in self.entry_rows().await? {
            match row.get(COL_STATUS).map(String::as_str) {
                Some("success") => success += 1,
                Some("fail") => fail += 1,
                _ => {}
            }
        }

        Ok(AuditStats::from_counts(success, fail))
    }

    /// Newest `limit` entries, most recent first. Unparseable rows are skipped.
    pub async fn recent(&self, limit: usize) -> Result<Vec<LogEntry>, StoreError> {
        Ok(self
            .entry_rows()
            .await?
            .iter()
            .filter_map(from_row)
            .take(limit)
            .collect())
    }

    /// Remove every entry and restore the header.
    pub async fn clear_all(&self) -> Result<(), StoreError> {
        let last = self.store.last_row_index().await?;
        if last > 0 {
            self.store.delete_rows(HEADER_ROW, last).await?;
        }
        self.ensure_header().await?;

        tracing::info!(removed = last.saturating_sub(HEADER_ROW), "audit log cleared");
        Ok(())
    }

    async fn ensure_header(&self) -> Result<(), StoreError> {
        if self.store.last_row_index().await? == 0 {
            let header = HEADER.iter().map(|cell| cell.to_string()).collect();
            self.store.insert_row(HEADER_ROW, header).await?;
        }
        Ok(())
    }

    async fn entry_rows(&self) -> Result<Vec<Row>, StoreError> {
        let mut rows = self.store.get_all_rows().await?;
        if !rows.is_empty() {
            rows.remove(0);
        }
        Ok(rows)
    }
}

/// Cap `text` at [`MAX_FIELD_CHARS`] characters, ending in `...` when cut.
pub fn truncate_field(text: &str) -> String {
    if text.chars().count() <= MAX_FIELD_CHARS {
        return text.to_string();
    }

    let mut truncated: String = text.chars().take(MAX_FIELD_CHARS - ELLIPSIS.len()).collect();
    truncated.push_str(ELLIPSIS);
    truncated
}

fn to_row(entry: &LogEntry) -> Row {
    let mut row = vec![String::new(); HEADER.len()];
    row[COL_TIMESTAMP] = entry.timestamp.to_rfc3339();
    row[COL_IDENTIFIER] = entry.identifier.clone();
    row[COL_TITLE] = entry.title.clone();
    row[COL_SCRIPT] = truncate_field(&entry.script_text);
    row[COL_RESULT] = truncate_field(&entry.result_text);
    row[COL_STATUS] = entry.status.to_string();
    row
}

fn from_row(row: &Row) -> Option<LogEntry> {
    let cell = |index: usize| row.get(index).cloned().unwrap_or_default();

    Some(LogEntry {
        timestamp: DateTime::parse_from_rfc3339(row.get(COL_TIMESTAMP)?)
            .ok()?
            .with_timezone(&Utc),
        identifier: cell(COL_IDENTIFIER),
        title: cell(COL_TITLE),
        script_text: cell(COL_SCRIPT),
        result_text: cell(COL_RESULT),
        status: row.get(COL_STATUS)?.parse().ok()?,
    })
}
