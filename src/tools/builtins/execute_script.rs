//! Script execution built-in tool.
//!
//! Gives the model a calculator-and-data-wrangling surface by running its
//! code in the script sandbox.

use crate::tools::sandbox::{Sandbox, SandboxConfig, ScriptSandbox, HELPERS};
use crate::tools::{
    ArgumentSchema, Capability, FieldType, ToolDefinition, ToolError, ToolFuture, ToolHandler,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const TOOL_NAME: &str = "execute_script";

/// Runs model-written scripts in a [`Sandbox`].
#[derive(Debug, Clone)]
pub struct ExecuteScriptTool {
    sandbox: Arc<dyn Sandbox>,
    max_source_len: usize,
    budget: Duration,
}

#[derive(Debug, Deserialize)]
struct ScriptArgs {
    code: String,
}

impl ExecuteScriptTool {
    /// Creates the tool backed by a [`ScriptSandbox`] with these limits.
    #[must_use]
    pub fn new(config: SandboxConfig) -> Self {
        let max_source_len = config.max_source_len;
        let budget = config.timeout();
        Self::with_sandbox(Arc::new(ScriptSandbox::new(config)), max_source_len, budget)
    }

    /// Creates the tool on top of any sandbox.
    #[must_use]
    pub fn with_sandbox(sandbox: Arc<dyn Sandbox>, max_source_len: usize, budget: Duration) -> Self {
        Self {
            sandbox,
            max_source_len,
            budget,
        }
    }

    /// Returns the definition shown to the model.
    #[must_use]
    pub fn definition() -> ToolDefinition {
        ToolDefinition::new(
            TOOL_NAME,
            format!(
                "Execute a short Rhai script for calculations or data processing. \
                 The value of the last expression is returned. `console.log`, \
                 `console.error`, `console.warn` and `console.info` output is captured. \
                 Available helpers: {}. There is no file, network or module access.",
                HELPERS.join(", ")
            ),
            ArgumentSchema::new().required("code", FieldType::String, "The script to run"),
            Capability::SandboxedCompute,
        )
    }
}

impl ToolHandler for ExecuteScriptTool {
    fn call(&self, args: Value) -> ToolFuture {
        let sandbox = Arc::clone(&self.sandbox);
        let max_source_len = self.max_source_len;
        let budget = self.budget;

        Box::pin(async move {
            let args: ScriptArgs = serde_json::from_value(args)
                .map_err(|e| ToolError::invalid_arguments(TOOL_NAME, e.to_string()))?;

            if args.code.trim().is_empty() {
                return Err(ToolError::invalid_arguments(TOOL_NAME, "code cannot be empty"));
            }
            if args.code.len() > max_source_len {
                return Err(ToolError::invalid_arguments(
                    TOOL_NAME,
                    format!(
                        "code is {} bytes; the limit is {}",
                        args.code.len(),
                        max_source_len
                    ),
                ));
            }

            let outcome = sandbox.execute(&args.code).await;
            tracing::debug!(
                success = outcome.success,
                elapsed_ms = outcome.elapsed_ms,
                "script finished"
            );
            outcome.into_tool_payload(TOOL_NAME, budget)
        })
    }
}
