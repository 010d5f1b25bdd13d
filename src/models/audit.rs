//! Audit log entry and statistics models.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Identifier recorded when authentication failed.
pub const UNKNOWN_IDENTIFIER: &str = "unknown";

/// Outcome recorded for one execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Success,
    Fail,
}

impl LogStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LogStatus::Success => "success",
            LogStatus::Fail => "fail",
        }
    }
}

impl fmt::Display for LogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(LogStatus::Success),
            "fail" => Ok(LogStatus::Fail),
            other => Err(format!("unknown log status: {other}")),
        }
    }
}

/// One row of the audit log.
///
/// `script_text` and `result_text` are truncated by the audit log when the
/// entry is appended, not here.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub identifier: String,
    pub title: String,
    pub script_text: String,
    pub result_text: String,
    pub status: LogStatus,
}

impl LogEntry {
    pub fn new(
        identifier: impl Into<String>,
        title: impl Into<String>,
        script_text: impl Into<String>,
        result_text: impl Into<String>,
        status: LogStatus,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            identifier: identifier.into(),
            title: title.into(),
            script_text: script_text.into(),
            result_text: result_text.into(),
            status,
        }
    }
}

/// Aggregate counts over the whole audit log.
///
/// ```json
/// { "total": 4, "success": 3, "fail": 1, "successRate": "75.00%" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditStats {
    pub total: usize,
    pub success: usize,
    pub fail: usize,
    pub success_rate: String,
}

impl AuditStats {
    pub fn from_counts(success: usize, fail: usize) -> Self {
        let total = success + fail;
        let success_rate = if total == 0 {
            "0%".to_string()
        } else {
            format!("{:.2}%", success as f64 * 100.0 / total as f64)
        };

        Self {
            total,
            success,
            fail,
            success_rate,
        }
    }
}
