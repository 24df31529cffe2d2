//! Tool definitions and the handler trait.

use crate::tools::error::ToolError;
use crate::tools::schema::ArgumentSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt::{self, Debug};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// What a tool is able to reach when it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Pure computation inside the process
    Pure,
    /// Untrusted code run inside the script sandbox
    SandboxedCompute,
    /// Read-only requests to a remote service
    NetworkRead,
    /// Calls to another language model
    ExternalModel,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pure => write!(f, "pure"),
            Self::SandboxedCompute => write!(f, "sandboxed_compute"),
            Self::NetworkRead => write!(f, "network_read"),
            Self::ExternalModel => write!(f, "external_model"),
        }
    }
}

/// Static description of a tool, shown to the model and used for validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolDefinition {
    /// Unique tool name
    pub name: String,
    /// What the tool does, in words the model can act on
    pub description: String,
    /// Accepted arguments
    pub schema: ArgumentSchema,
    /// What the tool can reach
    pub capability: Capability,
}

impl ToolDefinition {
    /// Creates a new definition.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: ArgumentSchema,
        capability: Capability,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
            capability,
        }
    }

    /// Returns the JSON Schema of the arguments.
    #[must_use]
    pub fn input_schema(&self) -> Value {
        self.schema.to_json_schema()
    }

    /// Renders the definition as a catalogue entry.
    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "capability": self.capability,
            "parameters": self.input_schema(),
        })
    }
}

/// The result type for tool handler futures.
pub type ToolFuture = Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send + 'static>>;

/// Runs a tool.
///
/// Handlers receive arguments that already passed schema validation.
///
/// # Example
///
/// ```rust
/// use agentloop::tools::{ToolFuture, ToolHandler};
/// use serde_json::Value;
///
/// #[derive(Debug)]
/// struct EchoTool;
///
/// impl ToolHandler for EchoTool {
///     fn call(&self, args: Value) -> ToolFuture {
///         Box::pin(async move { Ok(args) })
///     }
/// }
/// ```
pub trait ToolHandler: Send + Sync + Debug {
    /// Executes the tool with the given arguments.
    fn call(&self, args: Value) -> ToolFuture;
}

/// A definition paired with its handler.
#[derive(Debug, Clone)]
pub struct RegisteredTool {
    /// The tool definition
    pub definition: ToolDefinition,
    /// The handler invoked for calls to this tool
    pub handler: Arc<dyn ToolHandler>,
}

impl RegisteredTool {
    /// Creates a new registered tool.
    #[must_use]
    pub fn new(definition: ToolDefinition, handler: Arc<dyn ToolHandler>) -> Self {
        Self {
            definition,
            handler,
        }
    }

    /// Returns the tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.definition.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::schema::FieldType;

    #[test]
    fn input_schema_comes_from_argument_schema() {
        let definition = ToolDefinition::new(
            "echo",
            "Echo the input",
            ArgumentSchema::new().required("text", FieldType::String, "Text to echo"),
            Capability::Pure,
        );
        let schema = definition.input_schema();
        assert_eq!(schema["required"], json!(["text"]));
    }

    #[test]
    fn catalogue_entry_includes_capability() {
        let definition = ToolDefinition::new(
            "search",
            "Search",
            ArgumentSchema::new(),
            Capability::NetworkRead,
        );
        let entry = definition.to_json();
        assert_eq!(entry["name"], "search");
        assert_eq!(entry["capability"], "network_read");
        assert_eq!(entry["parameters"]["type"], "object");
    }

    #[test]
    fn capability_display_matches_serde() {
        for capability in [
            Capability::Pure,
            Capability::SandboxedCompute,
            Capability::NetworkRead,
            Capability::ExternalModel,
        ] {
            let json = serde_json::to_value(capability).unwrap();
            assert_eq!(json, json!(capability.to_string()));
        }
    }
}
