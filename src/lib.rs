//! # agentloop: a tool-using conversational agent loop
//!
//! Sends a conversation to a language model, runs the tools the model asks
//! for, feeds the results back, and repeats until the model answers in plain
//! text.
//!
//! ## Architecture
//!
//! - **Tool Registry**: immutable catalogue of tools with argument schemas
//! - **Sandbox**: runs model-written scripts on an allow-listed interpreter
//!   with a wall-clock and operation budget
//! - **Tool Dispatcher**: validates and runs one round of tool calls
//!   concurrently, isolating failures per call
//! - **Orchestrator**: owns the conversation and drives the
//!   model → tools → model loop one user turn at a time
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use agentloop::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = agentloop::config::load()?;
//!     let model = Arc::new(OpenAIClient::new(&config.model.to_provider_config())?);
//!     let registry = Arc::new(builtins::standard_registry(&config)?);
//!
//!     let mut orchestrator = Orchestrator::with_registry(model, registry, config.agent);
//!     let outcome = orchestrator.submit_user_input("What is 2^10?").await?;
//!     println!("{}", outcome.reply.unwrap_or_default());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod conversation;
pub mod error;
pub mod llm;
pub mod logging;
pub mod messages;
pub mod orchestrator;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod tools;
pub mod types;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::AgentLoopConfig;
    pub use crate::conversation::ConversationView;
    pub use crate::error::{AgentLoopError, AgentLoopErrorKind};
    pub use crate::llm::{ModelClient, ModelRequest, ModelResponse, OpenAIClient, ProviderConfig};
    pub use crate::messages::{Message, MessageRole, StopReason, ToolCallRequest, ToolResult};
    pub use crate::orchestrator::{
        AgentEvent, AgentState, Orchestrator, OrchestratorConfig, OrchestratorHandle, TurnOutcome,
    };
    pub use crate::tools::builtins;
    pub use crate::tools::sandbox::{ExecutionOutcome, Sandbox, SandboxConfig, ScriptSandbox};
    pub use crate::tools::{
        ArgumentSchema, Capability, FieldType, ToolDefinition, ToolError, ToolFuture, ToolHandler,
        ToolRegistry,
    };
    pub use crate::types::{ConversationId, TurnId};
}
