//! Script execution request and result types.

use serde::Serialize;
use serde_json::Value;

/// A parsed webhook request.
///
/// Exists only for the duration of one request. All three fields are
/// guaranteed non-empty by the parser.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub title: String,
    pub script: String,
    pub secret: String,
}

/// Classified script failure.
///
/// Displayed as `"<Kind>: <message>"`, which is the exact text that ends up in
/// responses and in the audit log.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScriptError {
    /// Rejected before execution (empty, oversized or denylisted).
    #[error("ValidationError: {0}")]
    Validation(String),

    #[error("SyntaxError: {0}")]
    Syntax(String),

    /// Unknown variable, function, property or module.
    #[error("ReferenceError: {0}")]
    Reference(String),

    #[error("TypeError: {0}")]
    Type(String),

    /// A `throw` or any other runtime failure.
    #[error("Error: {0}")]
    Other(String),
}

/// Result of one script execution.
///
/// `result` is present only on success and `error` only on failure;
/// `executionTimeMs` is always present.
///
/// ```json
/// { "success": true, "result": 2, "executionTimeMs": 1 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub execution_time_ms: u64,
}

impl ExecutionResult {
    pub fn succeeded(result: Value, execution_time_ms: u64) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
            execution_time_ms,
        }
    }

    pub fn failed(error: &ScriptError, execution_time_ms: u64) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.to_string()),
            execution_time_ms,
        }
    }

    /// Text recorded in the audit log's result column.
    ///
    /// Strings are stored as-is, other values as compact JSON, failures as the
    /// formatted error.
    pub fn result_text(&self) -> String {
        match (&self.result, &self.error) {
            (_, Some(error)) => error.clone(),
            (Some(Value::String(text)), None) => text.clone(),
            (Some(value), None) => value.to_string(),
            (None, None) => String::new(),
        }
    }
}
