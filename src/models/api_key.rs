//! API key model for webhook authentication.
//!
//! Keys are stored in the key-value store as JSON records. Only the SHA-256
//! digest of the secret is persisted; the plaintext secret is handed out once,
//! when the key is created.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Represents one API key record from the key-value store.
///
/// # Storage
///
/// Stored under `api_key:<identifier>`, serialized as camelCase JSON:
/// - `identifier`: human-chosen label, unique
/// - `secretHash`: SHA-256 hex digest of the secret
/// - `createdAt`: when the key was created
/// - `lastUsedAt`: last successful authentication, `null` until first use
/// - `usageCount`: number of successful authentications
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyRecord {
    /// Unique, non-secret label naming this key
    pub identifier: String,

    /// SHA-256 hash of the secret (64 hex characters)
    ///
    /// When a request comes in with `"apiKey": "abc123"`, we:
    /// 1. Hash "abc123" with SHA-256
    /// 2. Look up the identifier indexed under this hash
    /// 3. Confirm the record still carries the same hash
    pub secret_hash: String,

    /// Timestamp when this key was created
    pub created_at: DateTime<Utc>,

    /// Timestamp of the last successful authentication
    pub last_used_at: Option<DateTime<Utc>>,

    /// Number of successful authentications. Never decreases.
    pub usage_count: u64,
}

impl ApiKeyRecord {
    pub fn new(identifier: impl Into<String>, secret_hash: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            secret_hash: secret_hash.into(),
            created_at: Utc::now(),
            last_used_at: None,
            usage_count: 0,
        }
    }
}

/// Outcome of validating a presented secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyValidation {
    pub valid: bool,
    pub identifier: Option<String>,
}

impl KeyValidation {
    pub fn valid(identifier: impl Into<String>) -> Self {
        Self {
            valid: true,
            identifier: Some(identifier.into()),
        }
    }

    pub fn invalid() -> Self {
        Self {
            valid: false,
            identifier: None,
        }
    }
}

/// Request body for creating a key.
///
/// ```json
/// { "identifier": "reporting-bot" }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreateKeyRequest {
    pub identifier: String,
}

/// Response body returned once, when a key is created.
///
/// The `apiKey` is the only place the plaintext secret ever appears.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedKeyResponse {
    pub identifier: String,
    pub api_key: String,
    pub created_at: DateTime<Utc>,
}

/// Public view of a key record (no secret material).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeySummary {
    pub identifier: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub usage_count: u64,
}

impl From<ApiKeyRecord> for ApiKeySummary {
    fn from(record: ApiKeyRecord) -> Self {
        Self {
            identifier: record.identifier,
            created_at: record.created_at,
            last_used_at: record.last_used_at,
            usage_count: record.usage_count,
        }
    }
}
