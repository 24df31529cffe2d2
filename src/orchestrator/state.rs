//! Turn state enumeration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where an orchestrator is within a turn.
///
/// ```text
/// Idle --input--> AwaitingModel --tool calls--> DispatchingTools
///                      ^                              |
///                      +---------- results -----------+
/// AwaitingModel --no tool calls--> Terminated --> Idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    /// Waiting for user input
    #[default]
    Idle,
    /// A model call is in flight
    AwaitingModel,
    /// Tool calls from the last assistant message are running
    DispatchingTools,
    /// The model answered without tool calls; the turn is over
    Terminated,
}

impl AgentState {
    /// Returns true if a new user turn may start.
    #[must_use]
    pub fn can_accept_input(&self) -> bool {
        matches!(self, Self::Idle | Self::Terminated)
    }

    /// Returns true while a turn is running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::AwaitingModel | Self::DispatchingTools)
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::AwaitingModel => write!(f, "awaiting_model"),
            Self::DispatchingTools => write!(f, "dispatching_tools"),
            Self::Terminated => write!(f, "terminated"),
        }
    }
}
