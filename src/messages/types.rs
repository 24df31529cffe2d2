//! Conversation message types.
//!
//! Messages are immutable once appended to a conversation.

use crate::tools::ToolError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// The role of the message sender
    pub role: MessageRole,
    /// The text of the message; assistant messages that only request tools carry none
    pub content: Option<String>,
    /// Tool calls requested by an assistant message, in the model's order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
    /// ID of the tool call a tool message answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// When the message was created
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Creates a new user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
            created_at: Utc::now(),
        }
    }

    /// Creates a new assistant message with no tool calls.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::assistant_with_tools(Some(content.into()), Vec::new())
    }

    /// Creates a new assistant message carrying tool calls.
    #[must_use]
    pub fn assistant_with_tools(content: Option<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content,
            tool_calls,
            tool_call_id: None,
            created_at: Utc::now(),
        }
    }

    /// Creates a new tool response message.
    #[must_use]
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Tool,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
            created_at: Utc::now(),
        }
    }

    /// Returns the text content, or an empty string when there is none.
    #[must_use]
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }

    /// Returns true if this is an assistant message requesting tools.
    #[must_use]
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User input
    User,
    /// Model output
    Assistant,
    /// Result of a tool call
    Tool,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::Tool => write!(f, "tool"),
        }
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Identifier assigned by the model, echoed back on the result
    pub id: String,
    /// Name of the tool to invoke
    pub name: String,
    /// Argument payload, validated against the tool's schema before use
    pub arguments: Value,
}

impl ToolCallRequest {
    /// Creates a new tool call request.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// The outcome of one tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    /// The originating call identifier
    pub call_id: String,
    /// The tool the model asked for
    pub tool_name: String,
    /// Payload on success, classified error on failure
    pub outcome: Result<Value, ToolError>,
}

impl ToolResult {
    /// Creates a successful result.
    #[must_use]
    pub fn success(call_id: impl Into<String>, tool_name: impl Into<String>, value: Value) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            outcome: Ok(value),
        }
    }

    /// Creates a failed result.
    #[must_use]
    pub fn failure(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        error: ToolError,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            outcome: Err(error),
        }
    }

    /// Returns true if the tool succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Returns the error if the tool failed.
    #[must_use]
    pub fn error(&self) -> Option<&ToolError> {
        self.outcome.as_ref().err()
    }

    /// Renders the result as the JSON text of a tool message.
    #[must_use]
    pub fn to_content(&self) -> String {
        match &self.outcome {
            Ok(value) => value.to_string(),
            Err(error) => error.to_json().to_string(),
        }
    }

    /// Converts the result into the tool message that answers its call.
    #[must_use]
    pub fn into_message(self) -> Message {
        let content = self.to_content();
        Message::tool(self.call_id, content)
    }
}

/// The reason the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Normal completion
    #[default]
    EndTurn,
    /// Reached maximum tokens
    MaxTokens,
    /// Model wants to call tools
    ToolUse,
    /// A stop sequence or content filter ended the output
    StopSequence,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn user_message_has_content_and_no_calls() {
        let msg = Message::user("hello");
        assert_eq!(msg.role, MessageRole::User);
        assert_eq!(msg.text(), "hello");
        assert!(!msg.has_tool_calls());
        assert!(msg.tool_call_id.is_none());
    }

    #[test]
    fn assistant_with_only_tool_calls_has_null_content() {
        let call = ToolCallRequest::new("call_1", "google_search", json!({"query": "rust"}));
        let msg = Message::assistant_with_tools(None, vec![call]);
        assert!(msg.content.is_none());
        assert_eq!(msg.text(), "");
        assert!(msg.has_tool_calls());
    }

    #[test]
    fn tool_message_references_call() {
        let msg = Message::tool("call_9", "{}");
        assert_eq!(msg.role, MessageRole::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_9"));
    }

    #[test]
    fn success_content_is_json_payload() {
        let result = ToolResult::success("c1", "execute_script", json!({"success": true, "result": 4}));
        let content = result.to_content();
        let parsed: Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed["result"], json!(4));
    }

    #[test]
    fn string_payload_is_json_encoded() {
        let result = ToolResult::success("c1", "echo", json!("plain"));
        assert_eq!(result.to_content(), "\"plain\"");
    }

    #[test]
    fn failure_content_carries_error_kind() {
        let result = ToolResult::failure("c2", "nope", ToolError::unknown_tool("nope"));
        assert!(!result.is_success());
        let parsed: Value = serde_json::from_str(&result.to_content()).unwrap();
        assert_eq!(parsed["success"], json!(false));
        assert_eq!(parsed["error"]["kind"], json!("unknown_tool"));
    }

    #[test]
    fn into_message_answers_call() {
        let msg = ToolResult::success("c3", "echo", json!(1)).into_message();
        assert_eq!(msg.role, MessageRole::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("c3"));
        assert_eq!(msg.text(), "1");
    }

    #[test]
    fn message_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&MessageRole::Tool).unwrap(), "\"tool\"");
    }

    #[test]
    fn empty_tool_calls_are_not_serialized() {
        let json = serde_json::to_value(Message::user("hi")).unwrap();
        assert!(json.get("tool_calls").is_none());
        assert!(json.get("tool_call_id").is_none());
    }
}
