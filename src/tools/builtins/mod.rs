//! Built-in tools.
//!
//! ## Available Tools
//!
//! - **google_search**: Google Custom Search results (network read)
//! - **ai_pipe_workflow**: summarize, analyze or process text on a second model (external model)
//! - **execute_script**: run a script in the sandbox (sandboxed compute)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agentloop::config;
//! use agentloop::tools::builtins;
//!
//! let config = config::load()?;
//! let registry = builtins::standard_registry(&config)?;
//! ```
//!
//! To add tools of your own next to the built-ins, start from
//! [`standard_builder`] and register them before building.

mod ai_pipe_workflow;
mod execute_script;
mod google_search;

pub use ai_pipe_workflow::AiPipeWorkflowTool;
pub use execute_script::ExecuteScriptTool;
pub use google_search::{GoogleSearchTool, DEFAULT_NUM_RESULTS};

use crate::config::AgentLoopConfig;
use crate::error::AgentLoopError;
use crate::tools::{ToolError, ToolRegistry, ToolRegistryBuilder};
use std::sync::Arc;

/// Lists the built-in tool names in registration order.
#[must_use]
pub fn available() -> Vec<&'static str> {
    vec!["google_search", "ai_pipe_workflow", "execute_script"]
}

/// Returns a registry builder with every built-in tool registered.
///
/// # Errors
///
/// Returns a `Configuration` error if an HTTP client cannot be created.
pub fn standard_builder(config: &AgentLoopConfig) -> Result<ToolRegistryBuilder, AgentLoopError> {
    let search = GoogleSearchTool::new(config.search.clone()).map_err(setup_error)?;
    let workflow = AiPipeWorkflowTool::new(config.workflow.clone()).map_err(setup_error)?;
    let script = ExecuteScriptTool::new(config.sandbox.clone());

    Ok(ToolRegistry::builder()
        .register(GoogleSearchTool::definition(), Arc::new(search))
        .register(AiPipeWorkflowTool::definition(), Arc::new(workflow))
        .register(ExecuteScriptTool::definition(), Arc::new(script)))
}

/// Builds the registry holding exactly the built-in tools.
///
/// # Errors
///
/// See [`standard_builder`].
pub fn standard_registry(config: &AgentLoopConfig) -> Result<ToolRegistry, AgentLoopError> {
    standard_builder(config)?.build().map_err(setup_error)
}

fn setup_error(error: ToolError) -> AgentLoopError {
    AgentLoopError::configuration("tools", error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{Capability, ToolDefinition};
    use serde_json::json;

    #[test]
    fn standard_registry_has_every_builtin_in_order() {
        let registry = standard_registry(&AgentLoopConfig::default()).unwrap();
        assert_eq!(registry.names(), available());
    }

    #[test]
    fn capabilities_match_what_each_tool_reaches() {
        let registry = standard_registry(&AgentLoopConfig::default()).unwrap();
        let capability = |name: &str| registry.lookup(name).unwrap().definition.capability;

        assert_eq!(capability("google_search"), Capability::NetworkRead);
        assert_eq!(capability("ai_pipe_workflow"), Capability::ExternalModel);
        assert_eq!(capability("execute_script"), Capability::SandboxedCompute);
    }

    #[test]
    fn definitions_have_descriptions_and_object_schemas() {
        let registry = standard_registry(&AgentLoopConfig::default()).unwrap();
        for definition in registry.list() {
            assert!(!definition.description.is_empty(), "{} has no description", definition.name);
            assert_eq!(definition.input_schema()["type"], "object");
        }
    }

    #[test]
    fn builder_accepts_extra_tools_but_not_duplicates() {
        #[derive(Debug)]
        struct Noop;
        impl crate::tools::ToolHandler for Noop {
            fn call(&self, _args: serde_json::Value) -> crate::tools::ToolFuture {
                Box::pin(async { Ok(json!(null)) })
            }
        }

        let extra = ToolDefinition::new(
            "noop",
            "Does nothing",
            crate::tools::ArgumentSchema::new(),
            Capability::Pure,
        );
        let registry = standard_builder(&AgentLoopConfig::default())
            .unwrap()
            .register(extra, Arc::new(Noop))
            .build()
            .unwrap();
        assert_eq!(registry.len(), 4);

        let duplicate = standard_builder(&AgentLoopConfig::default())
            .unwrap()
            .register(ExecuteScriptTool::definition(), Arc::new(Noop))
            .build();
        assert!(duplicate.unwrap_err().is_already_registered());
    }
}
