//! Conversation messages and tool call types.

mod types;

pub use types::{Message, MessageRole, StopReason, ToolCallRequest, ToolResult};
