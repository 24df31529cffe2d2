//! Sandbox limits.

use crate::error::AgentLoopError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default wall-clock budget per script (5 seconds).
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Default hard cap on interpreter operations per script.
pub const DEFAULT_MAX_OPERATIONS: u64 = 50_000_000;

/// Default maximum function call nesting.
pub const DEFAULT_MAX_CALL_LEVELS: usize = 48;

/// Default maximum expression nesting.
pub const DEFAULT_MAX_EXPR_DEPTH: usize = 64;

/// Default maximum string length in bytes (1 MB).
pub const DEFAULT_MAX_STRING_SIZE: usize = 1024 * 1024;

/// Default maximum array length.
pub const DEFAULT_MAX_ARRAY_SIZE: usize = 100_000;

/// Default maximum object map size.
pub const DEFAULT_MAX_MAP_SIZE: usize = 10_000;

/// Default number of captured log lines kept.
pub const DEFAULT_MAX_LOG_LINES: usize = 1_000;

/// Default maximum length of one captured log line in bytes.
pub const DEFAULT_MAX_LOG_LINE_LEN: usize = 4_096;

/// Default maximum script length in bytes (64 KB).
pub const DEFAULT_MAX_SOURCE_LEN: usize = 64 * 1024;

/// Limits applied to every script run.
///
/// Deserializes from the `[sandbox]` table of the config file; every field is
/// optional there.
///
/// # Example
///
/// ```rust
/// use agentloop::tools::sandbox::SandboxConfig;
/// use std::time::Duration;
///
/// let config = SandboxConfig::new()
///     .with_timeout(Duration::from_millis(200))
///     .with_max_log_lines(50);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Wall-clock budget in milliseconds.
    pub timeout_ms: u64,
    /// Hard cap on interpreter operations.
    pub max_operations: u64,
    /// Maximum function call nesting.
    pub max_call_levels: usize,
    /// Maximum expression nesting at global level and inside functions.
    pub max_expr_depth: usize,
    /// Maximum string length in bytes.
    pub max_string_size: usize,
    /// Maximum array length.
    pub max_array_size: usize,
    /// Maximum object map size.
    pub max_map_size: usize,
    /// Captured log lines kept; later lines are counted and dropped.
    pub max_log_lines: usize,
    /// Captured log lines are truncated to this many bytes.
    pub max_log_line_len: usize,
    /// Scripts longer than this are rejected before compiling.
    pub max_source_len: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_operations: DEFAULT_MAX_OPERATIONS,
            max_call_levels: DEFAULT_MAX_CALL_LEVELS,
            max_expr_depth: DEFAULT_MAX_EXPR_DEPTH,
            max_string_size: DEFAULT_MAX_STRING_SIZE,
            max_array_size: DEFAULT_MAX_ARRAY_SIZE,
            max_map_size: DEFAULT_MAX_MAP_SIZE,
            max_log_lines: DEFAULT_MAX_LOG_LINES,
            max_log_line_len: DEFAULT_MAX_LOG_LINE_LEN,
            max_source_len: DEFAULT_MAX_SOURCE_LEN,
        }
    }
}

impl SandboxConfig {
    /// Creates a configuration with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the wall-clock budget.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Sets the wall-clock budget.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets the operation cap.
    #[must_use]
    pub fn with_max_operations(mut self, max: u64) -> Self {
        self.max_operations = max;
        self
    }

    /// Sets the call nesting cap.
    #[must_use]
    pub fn with_max_call_levels(mut self, max: usize) -> Self {
        self.max_call_levels = max;
        self
    }

    /// Sets the number of log lines kept.
    #[must_use]
    pub fn with_max_log_lines(mut self, max: usize) -> Self {
        self.max_log_lines = max;
        self
    }

    /// Sets the per-line log length cap.
    #[must_use]
    pub fn with_max_log_line_len(mut self, max: usize) -> Self {
        self.max_log_line_len = max;
        self
    }

    /// Sets the script length cap.
    #[must_use]
    pub fn with_max_source_len(mut self, max: usize) -> Self {
        self.max_source_len = max;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error naming the first invalid field.
    pub fn validate(&self) -> Result<(), AgentLoopError> {
        let nonzero = [
            ("sandbox.timeout_ms", self.timeout_ms == 0),
            ("sandbox.max_operations", self.max_operations == 0),
            ("sandbox.max_call_levels", self.max_call_levels == 0),
            ("sandbox.max_expr_depth", self.max_expr_depth == 0),
            ("sandbox.max_string_size", self.max_string_size == 0),
            ("sandbox.max_array_size", self.max_array_size == 0),
            ("sandbox.max_map_size", self.max_map_size == 0),
            ("sandbox.max_log_line_len", self.max_log_line_len == 0),
            ("sandbox.max_source_len", self.max_source_len == 0),
        ];

        if let Some((field, _)) = nonzero.iter().find(|(_, is_zero)| *is_zero) {
            return Err(AgentLoopError::configuration(
                *field,
                "must be greater than zero",
            ));
        }

        Ok(())
    }
}
