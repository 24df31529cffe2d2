//! Custom error types for the agent loop.
//!
//! Orchestrator-level failures live here. Tool-local failures are described by
//! [`crate::tools::ToolError`] and re-enter the conversation as tool messages
//! instead of being returned to the caller.
//!
//! No external error crates (anyhow, thiserror, eyre) are used in the library.

use crate::llm::LLMError;
use std::fmt;

/// Errors returned from a user turn or from setting up an orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentLoopError {
    /// The specific error that occurred
    pub kind: AgentLoopErrorKind,
}

/// Specific agent loop error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentLoopErrorKind {
    /// The model endpoint could not be reached or is temporarily refusing work
    ModelUnavailable {
        /// Description of the failure
        reason: String,
    },
    /// The model endpoint answered with an error or an unusable response
    ModelError {
        /// Description of the failure
        reason: String,
    },
    /// A turn is already in progress on this orchestrator
    Busy,
    /// The submitted user input was empty
    EmptyInput,
    /// The model kept requesting tools past the configured round cap
    TurnLimitExceeded {
        /// The configured number of tool rounds per turn
        limit: usize,
    },
    /// Configuration error
    Configuration {
        /// The configuration field with the problem
        field: String,
        /// Why it was invalid
        reason: String,
    },
}

impl AgentLoopError {
    /// Creates a new AgentLoopError with the given kind.
    #[must_use]
    pub fn new(kind: AgentLoopErrorKind) -> Self {
        Self { kind }
    }

    /// Creates a model unavailable error.
    #[must_use]
    pub fn model_unavailable(reason: impl Into<String>) -> Self {
        Self::new(AgentLoopErrorKind::ModelUnavailable {
            reason: reason.into(),
        })
    }

    /// Creates a model error.
    #[must_use]
    pub fn model_error(reason: impl Into<String>) -> Self {
        Self::new(AgentLoopErrorKind::ModelError {
            reason: reason.into(),
        })
    }

    /// Creates a busy error.
    #[must_use]
    pub fn busy() -> Self {
        Self::new(AgentLoopErrorKind::Busy)
    }

    /// Creates an empty input error.
    #[must_use]
    pub fn empty_input() -> Self {
        Self::new(AgentLoopErrorKind::EmptyInput)
    }

    /// Creates a turn limit exceeded error.
    #[must_use]
    pub fn turn_limit_exceeded(limit: usize) -> Self {
        Self::new(AgentLoopErrorKind::TurnLimitExceeded { limit })
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn configuration(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(AgentLoopErrorKind::Configuration {
            field: field.into(),
            reason: reason.into(),
        })
    }

    /// Returns true if the model could not be reached.
    #[must_use]
    pub fn is_model_unavailable(&self) -> bool {
        matches!(self.kind, AgentLoopErrorKind::ModelUnavailable { .. })
    }

    /// Returns true if the model answered with an error.
    #[must_use]
    pub fn is_model_error(&self) -> bool {
        matches!(self.kind, AgentLoopErrorKind::ModelError { .. })
    }

    /// Returns true if another turn was in progress.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(self.kind, AgentLoopErrorKind::Busy)
    }

    /// Returns true if the input was blank.
    #[must_use]
    pub fn is_empty_input(&self) -> bool {
        matches!(self.kind, AgentLoopErrorKind::EmptyInput)
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self.kind, AgentLoopErrorKind::Configuration { .. })
    }

    /// Returns true if the tool round cap was hit.
    #[must_use]
    pub fn is_turn_limit_exceeded(&self) -> bool {
        matches!(self.kind, AgentLoopErrorKind::TurnLimitExceeded { .. })
    }
}

impl From<LLMError> for AgentLoopError {
    fn from(error: LLMError) -> Self {
        if error.is_unavailable() {
            Self::model_unavailable(error.to_string())
        } else {
            Self::model_error(error.to_string())
        }
    }
}

impl fmt::Display for AgentLoopError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            AgentLoopErrorKind::ModelUnavailable { reason } => {
                write!(
                    f,
                    "model unavailable: {}; check network access and try again",
                    reason
                )
            }
            AgentLoopErrorKind::ModelError { reason } => {
                write!(f, "model error: {}", reason)
            }
            AgentLoopErrorKind::Busy => {
                write!(
                    f,
                    "a turn is already in progress; wait for it to finish before submitting"
                )
            }
            AgentLoopErrorKind::EmptyInput => {
                write!(f, "user input is empty; type a message first")
            }
            AgentLoopErrorKind::TurnLimitExceeded { limit } => {
                write!(
                    f,
                    "the model requested tools for more than {} rounds in one turn; \
                     raise agent.max_tool_rounds or rephrase the request",
                    limit
                )
            }
            AgentLoopErrorKind::Configuration { field, reason } => {
                write!(f, "invalid configuration for '{}': {}", field, reason)
            }
        }
    }
}

impl std::error::Error for AgentLoopError {}
