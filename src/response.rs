//! JSON response envelopes.
//!
//! Every webhook and admin error response goes through these builders so
//! callers always see the same shape:
//!
//! ```json
//! { "success": true, "result": "hi", "timestamp": "2025-12-21T19:00:00.000Z", "executionTimeMs": 1 }
//! { "success": false, "error": "Invalid API key", "statusCode": 401, "timestamp": "2025-12-21T19:00:00.000Z" }
//! ```
//!
//! Builders are pure apart from reading the clock for `timestamp`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value, json};

/// Message returned for a missing or unknown API key.
pub const INVALID_KEY_MESSAGE: &str = "Invalid API key";

/// Message returned for every unhandled failure. Details go to the log only.
pub const SERVER_ERROR_MESSAGE: &str = "Internal server error: request could not be completed";

/// Current time as RFC 3339 UTC with millisecond precision.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `{success: true, result, timestamp, ...metadata}`
pub fn success(result: Value, metadata: Map<String, Value>) -> Value {
    let mut body = Map::new();
    body.insert("success".into(), Value::Bool(true));
    body.insert("result".into(), result);
    body.insert("timestamp".into(), Value::String(timestamp()));
    body.extend(metadata);
    Value::Object(body)
}

/// `{success: false, error, statusCode, timestamp, ...details}`
pub fn error(message: impl Into<String>, status: StatusCode, details: Map<String, Value>) -> Value {
    let mut body = Map::new();
    body.insert("success".into(), Value::Bool(false));
    body.insert("error".into(), Value::String(message.into()));
    body.insert("statusCode".into(), json!(status.as_u16()));
    body.insert("timestamp".into(), Value::String(timestamp()));
    body.extend(details);
    Value::Object(body)
}

pub fn unauthorized() -> Value {
    error(INVALID_KEY_MESSAGE, StatusCode::UNAUTHORIZED, Map::new())
}

pub fn server_error(message: impl Into<String>) -> Value {
    error(message, StatusCode::INTERNAL_SERVER_ERROR, Map::new())
}

/// Reserved: not produced by the current request flow.
pub fn validation_error(errors: Vec<String>) -> Value {
    let mut details = Map::new();
    details.insert("errors".into(), json!(errors));
    error("Validation failed", StatusCode::UNPROCESSABLE_ENTITY, details)
}

/// Reserved: not produced by the current request flow.
pub fn rate_limited(retry_after_secs: u64) -> Value {
    let mut details = Map::new();
    details.insert("retryAfter".into(), json!(retry_after_secs));
    error("Rate limit exceeded", StatusCode::TOO_MANY_REQUESTS, details)
}

/// Pair a built envelope with its HTTP status.
pub fn respond(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_merges_metadata_after_base_fields() {
        let mut metadata = Map::new();
        metadata.insert("executionTimeMs".into(), json!(12));

        let body = success(json!("hi"), metadata);

        assert_eq!(body["success"], true);
        assert_eq!(body["result"], "hi");
        assert_eq!(body["executionTimeMs"], 12);
        assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn error_carries_status_code() {
        let body = error("nope", StatusCode::BAD_REQUEST, Map::new());

        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "nope");
        assert_eq!(body["statusCode"], 400);
        assert!(body.get("result").is_none());
    }

    #[test]
    fn unauthorized_uses_fixed_message() {
        let body = unauthorized();

        assert_eq!(body["error"], INVALID_KEY_MESSAGE);
        assert_eq!(body["statusCode"], 401);
    }

    #[test]
    fn server_error_is_500() {
        assert_eq!(server_error("x")["statusCode"], 500);
    }

    #[test]
    fn reserved_shapes() {
        let invalid = validation_error(vec!["title too long".into()]);
        assert_eq!(invalid["statusCode"], 422);
        assert_eq!(invalid["errors"], json!(["title too long"]));

        let limited = rate_limited(30);
        assert_eq!(limited["statusCode"], 429);
        assert_eq!(limited["retryAfter"], 30);
    }
}
