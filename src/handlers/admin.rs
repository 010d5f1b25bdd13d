//! Administration handlers for API keys and the audit log.
//!
//! All routes require `Authorization: Bearer <ADMIN_TOKEN>`:
//! - POST /admin/keys - Create a key (secret returned once)
//! - GET /admin/keys - List keys (no secrets)
//! - DELETE /admin/keys/{identifier} - Revoke a key
//! - GET /admin/logs - Recent audit entries
//! - GET /admin/logs/stats - Audit statistics
//! - DELETE /admin/logs - Clear the audit log

use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use crate::{
    error::AppError,
    models::{
        api_key::{ApiKeySummary, CreateKeyRequest, CreatedKeyResponse},
        audit::{AuditStats, LogEntry},
    },
    state::AppState,
};

const DEFAULT_LOG_LIMIT: usize = 50;
const MAX_LOG_LIMIT: usize = 1000;

/// Create a new API key.
///
/// # Request Body
///
/// ```json
/// { "identifier": "reporting-bot" }
/// ```
///
/// # Response
///
/// - **Success (201 Created)**: `{identifier, apiKey, createdAt}`
/// - **Error (400)**: Blank identifier or malformed body
/// - **Error (409)**: Identifier already exists
pub async fn create_key(
    State(state): State<AppState>,
    payload: Result<Json<CreateKeyRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload.map_err(|rejection| AppError::InvalidRequest(rejection.body_text()))?;
    let (secret, record) = state.key_store.create(&request.identifier).await?;

    let response = CreatedKeyResponse {
        identifier: record.identifier,
        api_key: secret,
        created_at: record.created_at,
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// List all keys, oldest first. Secrets are never included.
pub async fn list_keys(State(state): State<AppState>) -> Result<Json<Vec<ApiKeySummary>>, AppError> {
    let keys = state.key_store.list().await?;

    Ok(Json(keys.into_iter().map(Into::into).collect()))
}

/// Revoke a key.
///
/// Returns 204 No Content, or 404 if no key has this identifier.
pub async fn delete_key(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> Result<StatusCode, AppError> {
    if !state.key_store.delete(&identifier).await? {
        return Err(AppError::KeyNotFound(identifier));
    }

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct LogQuery {
    pub limit: Option<usize>,
}

/// Most recent audit entries, newest first.
///
/// `?limit=N` defaults to 50 and is capped at 1000.
pub async fn list_logs(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> Result<Json<Vec<LogEntry>>, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT).min(MAX_LOG_LIMIT);

    Ok(Json(state.audit_log.recent(limit).await?))
}

pub async fn log_stats(State(state): State<AppState>) -> Result<Json<AuditStats>, AppError> {
    Ok(Json(state.audit_log.stats().await?))
}

/// Remove every audit entry. Returns 204 No Content.
pub async fn clear_logs(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    state.audit_log.clear_all().await?;

    Ok(StatusCode::NO_CONTENT)
}
