//! Orchestrator configuration.

use serde::{Deserialize, Serialize};

/// Per-conversation settings for an [`Orchestrator`](super::Orchestrator).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Instructions sent ahead of the history on every model call
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Maximum tool rounds per user turn; `None` means no cap
    #[serde(default)]
    pub max_tool_rounds: Option<usize>,
}

impl OrchestratorConfig {
    /// Creates a configuration with no system prompt and no round cap.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the system prompt.
    ///
    /// # Examples
    ///
    /// ```
    /// use agentloop::orchestrator::OrchestratorConfig;
    ///
    /// let config = OrchestratorConfig::new().with_system_prompt("Be concise.");
    /// assert_eq!(config.system_prompt.as_deref(), Some("Be concise."));
    /// ```
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Caps the number of tool rounds per user turn.
    #[must_use]
    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = Some(rounds);
        self
    }
}
