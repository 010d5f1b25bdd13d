//! Webhook request pipeline.
//!
//! Each request walks `Parse → Authenticate → Execute → Log → Respond`; the
//! first failing stage short-circuits the rest.
//!
//! # Audit rules
//!
//! - Parse failures are never audited
//! - Authentication failures are audited as identifier `"unknown"` before the 401
//! - Every execution outcome is audited before the response is built
//! - A failed audit write turns the request into a 500

use std::sync::Arc;

use axum::{http::StatusCode, response::Response};
use serde_json::{Map, Value, json};

use super::{
    audit_log::AuditLog,
    capabilities::CapabilityProvider,
    execution_engine::ExecutionEngine,
    key_store::KeyStore,
};
use crate::{
    error::AppError,
    models::{
        audit::{LogEntry, LogStatus, UNKNOWN_IDENTIFIER},
        execution::{ExecutionRequest, ExecutionResult},
    },
    response::{self, INVALID_KEY_MESSAGE},
};

/// Title recorded for rejected requests that carry none.
const UNAUTHORIZED_TITLE: &str = "Unauthorized";

const FIELD_TITLE: &str = "title";
const FIELD_SCRIPT: &str = "script";
const FIELD_API_KEY: &str = "apiKey";
const FIELD_API_KEY_ALIAS: &str = "secret";

pub struct RequestHandler {
    key_store: Arc<KeyStore>,
    audit_log: Arc<AuditLog>,
    engine: Arc<ExecutionEngine>,
    capabilities: Arc<dyn CapabilityProvider>,
}

impl RequestHandler {
    pub fn new(
        key_store: Arc<KeyStore>,
        audit_log: Arc<AuditLog>,
        engine: Arc<ExecutionEngine>,
        capabilities: Arc<dyn CapabilityProvider>,
    ) -> Self {
        Self {
            key_store,
            audit_log,
            engine,
            capabilities,
        }
    }

    /// Run the full pipeline for one raw request body.
    pub async fn handle(&self, body: &[u8]) -> Response {
        match self.process(body).await {
            Ok(response) => response,
            Err(err) => axum::response::IntoResponse::into_response(err),
        }
    }

    async fn process(&self, body: &[u8]) -> Result<Response, AppError> {
        let request = parse_request(body)?;
        let identifier = self.authenticate(&request).await?;
        let result = self.execute(&request).await?;
        self.record(&request, &identifier, &result).await?;

        tracing::info!(
            %identifier,
            success = result.success,
            execution_time_ms = result.execution_time_ms,
            "script executed"
        );

        respond(result)
    }

    /// Validate the key and count the use. Invalid keys are audited here.
    async fn authenticate(&self, request: &ExecutionRequest) -> Result<String, AppError> {
        let validation = self.key_store.validate(&request.secret).await?;

        let Some(identifier) = validation.identifier.filter(|_| validation.valid) else {
            tracing::warn!(title = %request.title, "rejected webhook call with invalid API key");

            let title = if request.title.is_empty() {
                UNAUTHORIZED_TITLE
            } else {
                request.title.as_str()
            };
            let entry = LogEntry::new(
                UNKNOWN_IDENTIFIER,
                title,
                request.script.as_str(),
                INVALID_KEY_MESSAGE,
                LogStatus::Fail,
            );
            self.audit_log.append(&entry).await?;

            return Err(AppError::InvalidApiKey);
        };

        self.key_store.update_usage(&identifier).await?;
        Ok(identifier)
    }

    /// Run the script on a blocking thread; a panic there is an unhandled error.
    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult, AppError> {
        let engine = Arc::clone(&self.engine);
        let script = request.script.clone();
        let capabilities = self.capabilities.capabilities();

        tokio::task::spawn_blocking(move || engine.execute(&script, capabilities))
            .await
            .map_err(|err| AppError::Internal(format!("script task failed: {err}")))
    }

    async fn record(
        &self,
        request: &ExecutionRequest,
        identifier: &str,
        result: &ExecutionResult,
    ) -> Result<(), AppError> {
        let status = if result.success {
            LogStatus::Success
        } else {
            LogStatus::Fail
        };
        let entry = LogEntry::new(
            identifier,
            request.title.as_str(),
            request.script.as_str(),
            result.result_text(),
            status,
        );

        self.audit_log.append(&entry).await?;
        Ok(())
    }
}

/// Parse the raw body into an [`ExecutionRequest`].
///
/// Every missing or empty field is reported at once.
pub fn parse_request(body: &[u8]) -> Result<ExecutionRequest, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(AppError::InvalidRequest("Request body is empty".to_string()));
    }

    let payload: Value = serde_json::from_slice(body)
        .map_err(|err| AppError::InvalidRequest(format!("Invalid JSON payload: {err}")))?;

    let field = |name: &str| {
        payload
            .get(name)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    let title = field(FIELD_TITLE);
    let script = field(FIELD_SCRIPT);
    let secret = field(FIELD_API_KEY).or_else(|| field(FIELD_API_KEY_ALIAS));

    match (title, script, secret) {
        (Some(title), Some(script), Some(secret)) => Ok(ExecutionRequest {
            title,
            script,
            secret,
        }),
        (title, script, secret) => {
            let missing: Vec<&str> = [
                (FIELD_TITLE, title.is_none()),
                (FIELD_SCRIPT, script.is_none()),
                (FIELD_API_KEY, secret.is_none()),
            ]
            .into_iter()
            .filter_map(|(name, absent)| absent.then_some(name))
            .collect();

            Err(AppError::InvalidRequest(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )))
        }
    }
}

fn respond(result: ExecutionResult) -> Result<Response, AppError> {
    if !result.success {
        return Err(AppError::ScriptFailed {
            message: result.error.unwrap_or_default(),
            execution_time_ms: result.execution_time_ms,
        });
    }

    let mut metadata = Map::new();
    metadata.insert("executionTimeMs".into(), json!(result.execution_time_ms));
    let body = response::success(result.result.unwrap_or(Value::Null), metadata);

    Ok(response::respond(StatusCode::OK, body))
}
