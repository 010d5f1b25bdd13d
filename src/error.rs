//! Error types and HTTP error response handling.
//!
//! This module defines the request-level error taxonomy and how each class is
//! converted into an HTTP response with the standard error envelope.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Map, json};

use crate::{
    response,
    services::key_store::KeyStoreError,
    storage::StoreError,
};

/// Application-wide error type.
///
/// # Error Categories
///
/// - **Input Errors**: Missing or malformed request fields (no audit entry)
/// - **Authentication Errors**: Invalid or missing API key (audited as "unknown")
/// - **Script Errors**: Validation or runtime failure of the script (audited)
/// - **Key Management Errors**: Duplicate or unknown identifiers
/// - **Unhandled Errors**: Storage failures and anything else escaping the pipeline
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Request body is empty, not JSON, or lacks required fields.
    ///
    /// Returns HTTP 400 Bad Request.
    #[error("{0}")]
    InvalidRequest(String),

    /// API key is missing or unknown.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Invalid API key")]
    InvalidApiKey,

    /// Script was rejected or failed while running.
    ///
    /// Returns HTTP 400 Bad Request with `executionTimeMs`.
    #[error("Script execution failed: {message}")]
    ScriptFailed {
        message: String,
        execution_time_ms: u64,
    },

    /// Admin bearer token is missing or wrong.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Invalid admin token")]
    InvalidAdminToken,

    /// A key with this identifier already exists.
    ///
    /// Returns HTTP 409 Conflict.
    #[error("API key '{0}' already exists")]
    DuplicateIdentifier(String),

    /// No key with this identifier exists.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("API key '{0}' not found")]
    KeyNotFound(String),

    /// Storage backend failed.
    ///
    /// Returns HTTP 500; the cause is logged, never returned.
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    /// Anything else escaping the pipeline (task panics, CAS exhaustion).
    ///
    /// Returns HTTP 500; the cause is logged, never returned.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<KeyStoreError> for AppError {
    fn from(err: KeyStoreError) -> Self {
        match err {
            KeyStoreError::DuplicateIdentifier(identifier) => AppError::DuplicateIdentifier(identifier),
            KeyStoreError::InvalidIdentifier => {
                AppError::InvalidRequest("Identifier must not be empty".to_string())
            }
            KeyStoreError::Store(err) => AppError::Storage(err),
            err @ KeyStoreError::Contention(_) => AppError::Internal(err.to_string()),
        }
    }
}

/// Convert AppError into an HTTP response.
///
/// # Status Code Mapping
///
/// - `InvalidRequest` → 400 Bad Request
/// - `ScriptFailed` → 400 Bad Request (with `executionTimeMs`)
/// - `InvalidApiKey`, `InvalidAdminToken` → 401 Unauthorized
/// - `KeyNotFound` → 404 Not Found
/// - `DuplicateIdentifier` → 409 Conflict
/// - `Storage`, `Internal` → 500 Internal Server Error (hides details from client)
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::InvalidApiKey => (StatusCode::UNAUTHORIZED, response::unauthorized()),
            AppError::ScriptFailed {
                ref message,
                execution_time_ms,
            } => {
                let mut details = Map::new();
                details.insert("executionTimeMs".into(), json!(execution_time_ms));
                let message = format!("Script execution failed: {message}");
                (
                    StatusCode::BAD_REQUEST,
                    response::error(message, StatusCode::BAD_REQUEST, details),
                )
            }
            AppError::Storage(_) | AppError::Internal(_) => {
                tracing::error!(error = %self, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    response::server_error(response::SERVER_ERROR_MESSAGE),
                )
            }
            ref other => {
                let status = match other {
                    AppError::InvalidAdminToken => StatusCode::UNAUTHORIZED,
                    AppError::KeyNotFound(_) => StatusCode::NOT_FOUND,
                    AppError::DuplicateIdentifier(_) => StatusCode::CONFLICT,
                    _ => StatusCode::BAD_REQUEST,
                };
                (status, response::error(other.to_string(), status, Map::new()))
            }
        };

        response::respond(status, body)
    }
}
