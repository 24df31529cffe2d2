//! Script execution outcomes.

use crate::tools::error::ToolError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;

/// Why a script did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The wall-clock or operation budget ran out
    Timeout,
    /// The script reached for something outside the granted surface
    DisallowedConstruct,
    /// Syntax error, thrown error, limit hit or unconvertible result
    RuntimeFault,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::DisallowedConstruct => write!(f, "disallowed_construct"),
            Self::RuntimeFault => write!(f, "runtime_fault"),
        }
    }
}

/// A classified failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionFailure {
    /// Classification
    pub kind: FailureKind,
    /// Interpreter message
    pub reason: String,
}

/// Everything observed about one script run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    /// True if the script ran to completion
    pub success: bool,
    /// The script's result, null when it produced none or failed
    pub value: Value,
    /// Captured log lines in emission order
    pub logs: Vec<String>,
    /// Lines discarded after the log buffer filled up
    #[serde(default, skip_serializing_if = "is_zero")]
    pub dropped_log_lines: usize,
    /// When execution finished
    pub completed_at: DateTime<Utc>,
    /// Measured run time in milliseconds
    pub elapsed_ms: u64,
    /// Set when `success` is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<ExecutionFailure>,
    /// The original script, kept on failure for diagnosis
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

impl ExecutionOutcome {
    /// Creates a successful outcome.
    #[must_use]
    pub fn completed(value: Value, logs: Vec<String>, dropped: usize, elapsed: Duration) -> Self {
        Self {
            success: true,
            value,
            logs,
            dropped_log_lines: dropped,
            completed_at: Utc::now(),
            elapsed_ms: millis(elapsed),
            failure: None,
            source: None,
        }
    }

    /// Creates a failed outcome.
    #[must_use]
    pub fn failed(
        kind: FailureKind,
        reason: impl Into<String>,
        source: impl Into<String>,
        logs: Vec<String>,
        dropped: usize,
        elapsed: Duration,
    ) -> Self {
        Self {
            success: false,
            value: Value::Null,
            logs,
            dropped_log_lines: dropped,
            completed_at: Utc::now(),
            elapsed_ms: millis(elapsed),
            failure: Some(ExecutionFailure {
                kind,
                reason: reason.into(),
            }),
            source: Some(source.into()),
        }
    }

    /// Returns the failure classification, if any.
    #[must_use]
    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.failure.as_ref().map(|f| f.kind)
    }

    /// Returns the captured logs joined by newlines, or `None` if there were none.
    #[must_use]
    pub fn output(&self) -> Option<String> {
        if self.logs.is_empty() {
            None
        } else {
            Some(self.logs.join("\n"))
        }
    }

    /// Converts the outcome into the payload of a tool call.
    ///
    /// # Errors
    ///
    /// A failed outcome becomes the matching [`ToolError`], carrying the full
    /// outcome as details.
    pub fn into_tool_payload(self, tool_name: &str, budget: Duration) -> Result<Value, ToolError> {
        let Some(failure) = self.failure.clone() else {
            return Ok(json!({
                "success": true,
                "result": self.value,
                "output": self.output(),
                "executed_at": self.completed_at.to_rfc3339(),
                "execution_time_ms": self.elapsed_ms,
            }));
        };

        let error = match failure.kind {
            FailureKind::Timeout => ToolError::timeout(tool_name, budget),
            FailureKind::DisallowedConstruct => {
                ToolError::disallowed_construct(tool_name, failure.reason)
            }
            FailureKind::RuntimeFault => ToolError::runtime(tool_name, failure.reason),
        };
        let details = serde_json::to_value(&self).unwrap_or(Value::Null);
        Err(error.with_details(details))
    }
}

fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
