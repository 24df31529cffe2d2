//! Tools the model can call.
//!
//! - **Definitions**: name, description, argument schema and capability of each tool
//! - **Registry**: the immutable set of tools fixed at startup
//! - **Dispatcher**: validates and runs a batch of calls concurrently
//! - **Sandbox**: isolated interpreter behind the `execute_script` tool
//! - **Builtins**: the standard tool set
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agentloop::tools::{ToolDispatcher, ToolRegistry};
//! use agentloop::orchestrator::EventBus;
//! use std::sync::Arc;
//!
//! let registry = ToolRegistry::builder()
//!     .register(definition, handler)
//!     .build()?;
//! let dispatcher = ToolDispatcher::new(Arc::new(registry), EventBus::default());
//! let results = dispatcher.dispatch(&tool_calls).await;
//! ```

pub mod builtins;
mod definition;
mod dispatcher;
mod error;
mod registry;
pub mod sandbox;
mod schema;

pub use definition::{Capability, RegisteredTool, ToolDefinition, ToolFuture, ToolHandler};
pub use dispatcher::{ToolDispatcher, UsageCounters};
pub use error::{ToolError, ToolErrorKind};
pub use registry::{ToolRegistry, ToolRegistryBuilder};
pub use schema::{ArgumentSchema, FieldSpec, FieldType};
