//! Model client trait abstraction.
//!
//! The orchestrator talks to the language model only through
//! [`ModelClient`], so the HTTP client, a scripted test double, or any other
//! backend can drive a conversation.

use crate::llm::error::LLMError;
use crate::messages::{Message, StopReason, ToolCallRequest};
use crate::tools::ToolDefinition;
use async_trait::async_trait;

/// Everything the model sees for one call.
#[derive(Debug, Clone, Default)]
pub struct ModelRequest {
    /// Instructions sent ahead of the conversation
    pub system_prompt: Option<String>,
    /// The full conversation so far, in order
    pub messages: Vec<Message>,
    /// Tools the model may request
    pub tools: Vec<ToolDefinition>,
}

impl ModelRequest {
    /// Creates a request over the given history with no tools.
    #[must_use]
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            system_prompt: None,
            messages,
            tools: Vec::new(),
        }
    }

    /// Sets the system prompt.
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Sets the advertised tools.
    #[must_use]
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }
}

/// The model's answer to a [`ModelRequest`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModelResponse {
    /// Generated text, if any
    pub text: Option<String>,
    /// Tool calls requested by the model
    pub tool_calls: Vec<ToolCallRequest>,
    /// Why the model stopped generating
    pub stop_reason: StopReason,
}

impl ModelResponse {
    /// A plain text answer with no tool calls.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            tool_calls: Vec::new(),
            stop_reason: StopReason::EndTurn,
        }
    }

    /// An answer requesting tool calls, with optional accompanying text.
    #[must_use]
    pub fn tool_calls(text: Option<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            text,
            tool_calls,
            stop_reason: StopReason::ToolUse,
        }
    }

    /// Returns true if the model requested at least one tool call.
    #[must_use]
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Returns the text if it is present and not blank.
    #[must_use]
    pub fn non_empty_text(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.trim().is_empty())
    }
}

/// Trait for language model backends.
///
/// # Example
///
/// ```ignore
/// use agentloop::llm::{ModelClient, ModelRequest, OpenAIClient, ProviderConfig};
/// use agentloop::messages::Message;
///
/// let client = OpenAIClient::new(&ProviderConfig::openai("api-key"))?;
/// let request = ModelRequest::new(vec![Message::user("Hello!")]);
/// let response = client.call(request).await?;
/// ```
#[async_trait]
pub trait ModelClient: Send + Sync + std::fmt::Debug {
    /// Sends the conversation and waits for the complete answer.
    ///
    /// # Errors
    ///
    /// Returns an error if the model is unreachable or answers with an error.
    async fn call(&self, request: ModelRequest) -> Result<ModelResponse, LLMError>;

    /// Returns the name of this provider for logging.
    fn provider_name(&self) -> &'static str;
}
