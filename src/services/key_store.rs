//! Key store - API key records, secret validation and usage tracking.
//!
//! # Layout in the key-value store
//!
//! - `api_key:<identifier>` → JSON [`ApiKeyRecord`]
//! - `api_key_secret:<sha256(secret)>` → identifier
//!
//! The secret index turns validation into a point lookup. The record is the
//! source of truth: an index entry whose record is missing or carries a
//! different hash is treated as invalid.
//!
//! # Consistency
//!
//! Creation is insert-if-absent and usage updates are compare-and-swap retry
//! loops, so concurrent requests neither duplicate identifiers nor lose
//! usage increments.

use std::sync::Arc;

use chrono::Utc;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{
    models::api_key::{ApiKeyRecord, KeyValidation},
    storage::{KeyValueStore, StoreError},
};

const RECORD_PREFIX: &str = "api_key:";
const SECRET_INDEX_PREFIX: &str = "api_key_secret:";
const MAX_USAGE_UPDATE_ATTEMPTS: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum KeyStoreError {
    #[error("API key '{0}' already exists")]
    DuplicateIdentifier(String),

    #[error("identifier must not be empty")]
    InvalidIdentifier,

    /// Usage update kept losing compare-and-swap races.
    #[error("usage update for '{0}' did not converge")]
    Contention(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<serde_json::Error> for KeyStoreError {
    fn from(err: serde_json::Error) -> Self {
        KeyStoreError::Store(StoreError::Serialization(err))
    }
}

pub struct KeyStore {
    store: Arc<dyn KeyValueStore>,
}

impl KeyStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Check a presented secret.
    ///
    /// Empty or unknown secrets yield `valid = false, identifier = None`.
    pub async fn validate(&self, secret: &str) -> Result<KeyValidation, KeyStoreError> {
        if secret.is_empty() {
            return Ok(KeyValidation::invalid());
        }

        let secret_hash = hash_secret(secret);
        let Some(identifier) = self.store.get(&secret_index_key(&secret_hash)).await? else {
            return Ok(KeyValidation::invalid());
        };

        match self.load(&identifier).await? {
            Some((record, _)) if record.secret_hash == secret_hash => {
                Ok(KeyValidation::valid(record.identifier))
            }
            _ => {
                tracing::warn!(%identifier, "secret index points at a missing or rotated record");
                Ok(KeyValidation::invalid())
            }
        }
    }

    /// Create a key for `identifier` and return its plaintext secret.
    ///
    /// The secret index is written before the record, so a failure part way
    /// leaves at most an index entry, which is removed again on the way out.
    /// An index entry without a matching record never validates.
    ///
    /// # Errors
    ///
    /// - `InvalidIdentifier`: identifier is blank
    /// - `DuplicateIdentifier`: a record already exists (nothing is modified)
    pub async fn create(&self, identifier: &str) -> Result<(String, ApiKeyRecord), KeyStoreError> {
        let identifier = normalize(identifier);
        if identifier.is_empty() {
            return Err(KeyStoreError::InvalidIdentifier);
        }

        let secret = Uuid::new_v4().to_string();
        let record = ApiKeyRecord::new(identifier, hash_secret(&secret));
        let encoded = serde_json::to_string(&record)?;
        let index_key = secret_index_key(&record.secret_hash);

        self.store.set(&index_key, identifier).await?;

        match self
            .store
            .compare_and_swap(&record_key(identifier), None, &encoded)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                self.discard_index(&index_key).await;
                return Err(KeyStoreError::DuplicateIdentifier(identifier.to_string()));
            }
            Err(err) => {
                self.discard_index(&index_key).await;
                return Err(err.into());
            }
        }

        tracing::info!(%identifier, "API key created");
        Ok((secret, record))
    }

    /// Remove the key for `identifier`. Returns whether it existed.
    pub async fn delete(&self, identifier: &str) -> Result<bool, KeyStoreError> {
        let identifier = normalize(identifier);
        let Some((record, _)) = self.load(identifier).await? else {
            return Ok(false);
        };

        self.store
            .delete(&secret_index_key(&record.secret_hash))
            .await?;
        let removed = self.store.delete(&record_key(identifier)).await?;

        tracing::info!(%identifier, "API key deleted");
        Ok(removed)
    }

    /// Stamp `lastUsedAt` and increment `usageCount`.
    ///
    /// A record deleted since validation is skipped with a warning.
    pub async fn update_usage(&self, identifier: &str) -> Result<(), KeyStoreError> {
        let identifier = normalize(identifier);
        for _ in 0..MAX_USAGE_UPDATE_ATTEMPTS {
            let Some((mut record, current)) = self.load(identifier).await? else {
                tracing::warn!(%identifier, "API key vanished before usage update");
                return Ok(());
            };

            record.last_used_at = Some(Utc::now());
            record.usage_count += 1;
            let updated = serde_json::to_string(&record)?;

            if self
                .store
                .compare_and_swap(&record_key(identifier), Some(&current), &updated)
                .await?
            {
                return Ok(());
            }
        }

        Err(KeyStoreError::Contention(identifier.to_string()))
    }

    /// All key records, oldest first.
    pub async fn list(&self) -> Result<Vec<ApiKeyRecord>, KeyStoreError> {
        let mut records = Vec::new();

        for key in self.store.keys().await? {
            let Some(identifier) = key.strip_prefix(RECORD_PREFIX) else {
                continue;
            };
            if let Some((record, _)) = self.load(identifier).await? {
                records.push(record);
            }
        }

        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(records)
    }

    /// Storage connectivity check.
    pub async fn ping(&self) -> Result<(), StoreError> {
        self.store.ping().await
    }

    /// Roll back an index entry whose record was never written.
    async fn discard_index(&self, index_key: &str) {
        if let Err(err) = self.store.delete(index_key).await {
            tracing::error!(error = %err, "failed to remove orphaned secret index entry");
        }
    }

    /// Fetch a record together with its raw stored form (the CAS expectation).
    async fn load(&self, identifier: &str) -> Result<Option<(ApiKeyRecord, String)>, KeyStoreError> {
        let Some(raw) = self.store.get(&record_key(identifier)).await? else {
            return Ok(None);
        };

        let record = serde_json::from_str(&raw)?;
        Ok(Some((record, raw)))
    }
}

/// Identifiers are compared without surrounding whitespace everywhere.
fn normalize(identifier: &str) -> &str {
    identifier.trim()
}

fn record_key(identifier: &str) -> String {
    format!("{RECORD_PREFIX}{identifier}")
}

fn secret_index_key(secret_hash: &str) -> String {
    format!("{SECRET_INDEX_PREFIX}{secret_hash}")
}

fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}
