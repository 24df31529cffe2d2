//! The tool catalogue.
//!
//! A [`ToolRegistry`] is assembled once through [`ToolRegistryBuilder`] and is
//! read-only afterwards, so it can be shared as `Arc<ToolRegistry>` across
//! concurrent dispatches without locking.

use crate::tools::definition::{RegisteredTool, ToolDefinition, ToolHandler};
use crate::tools::error::ToolError;
use std::collections::HashMap;
use std::sync::Arc;

/// Immutable catalogue of tools, in registration order.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Starts building a registry.
    #[must_use]
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    /// Returns every definition in registration order.
    #[must_use]
    pub fn list(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition.clone()).collect()
    }

    /// Returns every tool name in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(RegisteredTool::name).collect()
    }

    /// Looks up a tool by name.
    ///
    /// # Errors
    ///
    /// Returns `UnknownTool` if no tool has that name.
    pub fn lookup(&self, name: &str) -> Result<&RegisteredTool, ToolError> {
        self.index
            .get(name)
            .map(|&i| &self.tools[i])
            .ok_or_else(|| ToolError::unknown_tool(name))
    }

    /// Returns true if a tool with the name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Returns the number of tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns true if the registry has no tools.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Collects tools for a [`ToolRegistry`].
#[derive(Debug, Default)]
pub struct ToolRegistryBuilder {
    tools: Vec<RegisteredTool>,
}

impl ToolRegistryBuilder {
    /// Adds a tool.
    #[must_use]
    pub fn register(mut self, definition: ToolDefinition, handler: Arc<dyn ToolHandler>) -> Self {
        self.tools.push(RegisteredTool::new(definition, handler));
        self
    }

    /// Builds the registry.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyRegistered` if two tools share a name.
    pub fn build(self) -> Result<ToolRegistry, ToolError> {
        let mut index = HashMap::with_capacity(self.tools.len());
        for (i, tool) in self.tools.iter().enumerate() {
            if index.insert(tool.name().to_string(), i).is_some() {
                return Err(ToolError::already_registered(tool.name()));
            }
        }

        tracing::debug!(tools = ?index.keys().collect::<Vec<_>>(), "tool registry built");

        Ok(ToolRegistry {
            tools: self.tools,
            index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::definition::{Capability, ToolFuture};
    use crate::tools::schema::ArgumentSchema;
    use serde_json::Value;

    #[derive(Debug)]
    struct Noop;

    impl ToolHandler for Noop {
        fn call(&self, _args: Value) -> ToolFuture {
            Box::pin(async { Ok(Value::Null) })
        }
    }

    fn definition(name: &str) -> ToolDefinition {
        ToolDefinition::new(name, "test tool", ArgumentSchema::new(), Capability::Pure)
    }

    #[test]
    fn list_preserves_registration_order() {
        let registry = ToolRegistry::builder()
            .register(definition("b"), Arc::new(Noop))
            .register(definition("a"), Arc::new(Noop))
            .register(definition("c"), Arc::new(Noop))
            .build()
            .unwrap();

        let names: Vec<String> = registry.list().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
        assert_eq!(registry.names(), vec!["b", "a", "c"]);
    }

    #[test]
    fn lookup_finds_registered_tool() {
        let registry = ToolRegistry::builder()
            .register(definition("echo"), Arc::new(Noop))
            .build()
            .unwrap();

        let tool = registry.lookup("echo").unwrap();
        assert_eq!(tool.name(), "echo");
        assert!(registry.contains("echo"));
    }

    #[test]
    fn lookup_unknown_tool_fails() {
        let registry = ToolRegistry::builder().build().unwrap();
        let err = registry.lookup("missing").unwrap_err();
        assert!(err.is_unknown_tool());
        assert!(registry.is_empty());
    }

    #[test]
    fn duplicate_names_rejected_at_build() {
        let err = ToolRegistry::builder()
            .register(definition("dup"), Arc::new(Noop))
            .register(definition("dup"), Arc::new(Noop))
            .build()
            .unwrap_err();
        assert!(err.is_already_registered());
    }
}
