//! Tool error types.
//!
//! Tool-local failures. These never abort a turn: the dispatcher turns them
//! into failed [`ToolResult`](crate::messages::ToolResult)s, which re-enter the
//! conversation as tool messages so the model can react to them.

use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;

/// Errors that can occur while registering, validating or running a tool.
///
/// This type uses `Box<ToolErrorKind>` to keep the error size small,
/// enabling efficient use in Result types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolError {
    /// The specific error that occurred (boxed for size efficiency)
    kind: Box<ToolErrorKind>,
    /// Structured context reported back to the model alongside the message
    details: Option<Value>,
}

/// Specific tool error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolErrorKind {
    /// The model named a tool that is not in the registry
    UnknownTool {
        /// The name the model asked for
        tool_name: String,
    },
    /// The argument payload does not match the tool's schema
    InvalidArguments {
        /// The name of the tool
        tool_name: String,
        /// What was invalid
        reason: String,
    },
    /// The handler or an external adapter failed
    ToolRuntimeError {
        /// The name of the tool
        tool_name: String,
        /// Reason for failure
        reason: String,
    },
    /// Execution exceeded its time budget
    Timeout {
        /// The name of the tool
        tool_name: String,
        /// The budget that was exceeded
        budget: Duration,
    },
    /// Sandboxed code reached for a capability it was not granted
    DisallowedConstruct {
        /// The name of the tool
        tool_name: String,
        /// What was attempted
        reason: String,
    },
    /// Two tools with the same name were registered
    AlreadyRegistered {
        /// The duplicated name
        tool_name: String,
    },
}

impl ToolError {
    /// Creates a new ToolError with the given kind.
    #[must_use]
    pub fn new(kind: ToolErrorKind) -> Self {
        Self {
            kind: Box::new(kind),
            details: None,
        }
    }

    /// Attaches structured details to the error.
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Returns a reference to the error kind.
    #[must_use]
    pub fn kind(&self) -> &ToolErrorKind {
        &self.kind
    }

    /// Returns the structured details, if any.
    #[must_use]
    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    /// Creates an unknown tool error.
    #[must_use]
    pub fn unknown_tool(tool_name: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::UnknownTool {
            tool_name: tool_name.into(),
        })
    }

    /// Creates an invalid arguments error.
    #[must_use]
    pub fn invalid_arguments(tool_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::InvalidArguments {
            tool_name: tool_name.into(),
            reason: reason.into(),
        })
    }

    /// Creates a runtime error.
    #[must_use]
    pub fn runtime(tool_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::ToolRuntimeError {
            tool_name: tool_name.into(),
            reason: reason.into(),
        })
    }

    /// Creates a timeout error.
    #[must_use]
    pub fn timeout(tool_name: impl Into<String>, budget: Duration) -> Self {
        Self::new(ToolErrorKind::Timeout {
            tool_name: tool_name.into(),
            budget,
        })
    }

    /// Creates a disallowed construct error.
    #[must_use]
    pub fn disallowed_construct(tool_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::DisallowedConstruct {
            tool_name: tool_name.into(),
            reason: reason.into(),
        })
    }

    /// Creates an already registered error.
    #[must_use]
    pub fn already_registered(tool_name: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::AlreadyRegistered {
            tool_name: tool_name.into(),
        })
    }

    /// Returns the stable tag used for this error on the wire.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self.kind.as_ref() {
            ToolErrorKind::UnknownTool { .. } => "unknown_tool",
            ToolErrorKind::InvalidArguments { .. } => "invalid_arguments",
            ToolErrorKind::ToolRuntimeError { .. } => "tool_runtime_error",
            ToolErrorKind::Timeout { .. } => "timeout",
            ToolErrorKind::DisallowedConstruct { .. } => "disallowed_construct",
            ToolErrorKind::AlreadyRegistered { .. } => "already_registered",
        }
    }

    /// Returns true if the tool was not in the registry.
    #[must_use]
    pub fn is_unknown_tool(&self) -> bool {
        matches!(*self.kind, ToolErrorKind::UnknownTool { .. })
    }

    /// Returns true if the arguments failed schema validation.
    #[must_use]
    pub fn is_invalid_arguments(&self) -> bool {
        matches!(*self.kind, ToolErrorKind::InvalidArguments { .. })
    }

    /// Returns true if the handler itself failed.
    #[must_use]
    pub fn is_runtime_error(&self) -> bool {
        matches!(*self.kind, ToolErrorKind::ToolRuntimeError { .. })
    }

    /// Returns true if the time budget was exceeded.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(*self.kind, ToolErrorKind::Timeout { .. })
    }

    /// Returns true if sandboxed code was denied a capability.
    #[must_use]
    pub fn is_disallowed_construct(&self) -> bool {
        matches!(*self.kind, ToolErrorKind::DisallowedConstruct { .. })
    }

    /// Returns true if this error indicates the tool is already registered.
    #[must_use]
    pub fn is_already_registered(&self) -> bool {
        matches!(*self.kind, ToolErrorKind::AlreadyRegistered { .. })
    }

    /// Renders the error as the JSON payload sent back to the model.
    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({
            "success": false,
            "error": {
                "kind": self.kind_name(),
                "message": self.to_string(),
            },
            "details": self.details.clone().unwrap_or(Value::Null),
        })
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind.as_ref() {
            ToolErrorKind::UnknownTool { tool_name } => {
                write!(
                    f,
                    "tool '{}' does not exist; use one of the listed tools",
                    tool_name
                )
            }
            ToolErrorKind::InvalidArguments { tool_name, reason } => {
                write!(
                    f,
                    "invalid arguments for tool '{}': {}; check the argument schema",
                    tool_name, reason
                )
            }
            ToolErrorKind::ToolRuntimeError { tool_name, reason } => {
                write!(f, "tool '{}' failed: {}", tool_name, reason)
            }
            ToolErrorKind::Timeout { tool_name, budget } => {
                write!(
                    f,
                    "tool '{}' exceeded its time budget of {} ms",
                    tool_name,
                    budget.as_millis()
                )
            }
            ToolErrorKind::DisallowedConstruct { tool_name, reason } => {
                write!(
                    f,
                    "tool '{}' rejected the code: {}; only the documented sandbox functions are available",
                    tool_name, reason
                )
            }
            ToolErrorKind::AlreadyRegistered { tool_name } => {
                write!(
                    f,
                    "tool '{}' is already registered; tool names must be unique",
                    tool_name
                )
            }
        }
    }
}

impl std::error::Error for ToolError {}
