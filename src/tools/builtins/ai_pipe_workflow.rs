//! AI Pipe workflow built-in tool.
//!
//! Hands a piece of data to a second model through the AI Pipe proxy, an
//! OpenAI-compatible chat completion endpoint, with a prompt chosen by the
//! workflow kind.

use crate::config::WorkflowConfig;
use crate::tools::{
    ArgumentSchema, Capability, FieldType, ToolDefinition, ToolError, ToolFuture, ToolHandler,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const TOOL_NAME: &str = "ai_pipe_workflow";

/// AI Pipe workflow tool.
#[derive(Debug, Clone)]
pub struct AiPipeWorkflowTool {
    client: reqwest::Client,
    config: WorkflowConfig,
}

#[derive(Debug, Deserialize)]
struct WorkflowArgs {
    workflow: String,
    data: String,
}

impl AiPipeWorkflowTool {
    /// Creates the tool.
    ///
    /// # Errors
    ///
    /// Returns a runtime error if the HTTP client cannot be built.
    pub fn new(config: WorkflowConfig) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ToolError::runtime(TOOL_NAME, format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Returns the definition shown to the model.
    #[must_use]
    pub fn definition() -> ToolDefinition {
        ToolDefinition::new(
            TOOL_NAME,
            "Run a text workflow on a second language model. \
             Workflows: summarize, analyze, process, or any other task description.",
            ArgumentSchema::new()
                .required(
                    "workflow",
                    FieldType::String,
                    "The workflow to run: summarize, analyze, process, or a free-form task",
                )
                .required("data", FieldType::String, "The text to run the workflow on"),
            Capability::ExternalModel,
        )
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

impl ToolHandler for AiPipeWorkflowTool {
    fn call(&self, args: Value) -> ToolFuture {
        let client = self.client.clone();
        let config = self.config.clone();
        let endpoint = self.endpoint();

        Box::pin(async move {
            let args: WorkflowArgs = serde_json::from_value(args)
                .map_err(|e| ToolError::invalid_arguments(TOOL_NAME, e.to_string()))?;

            let token = config.resolve_token().ok_or_else(|| {
                ToolError::runtime(
                    TOOL_NAME,
                    format!("no AI Pipe token; set the {} environment variable", config.token_env),
                )
            })?;

            let body = json!({
                "model": config.model,
                "messages": [{"role": "user", "content": build_prompt(&args.workflow, &args.data)}],
                "max_tokens": config.max_tokens,
                "temperature": config.temperature,
            });
            tracing::debug!(workflow = %args.workflow, model = %config.model, "running workflow");

            let response = client
                .post(&endpoint)
                .bearer_auth(token)
                .json(&body)
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        ToolError::timeout(TOOL_NAME, Duration::from_secs(config.timeout_secs))
                    } else {
                        ToolError::runtime(TOOL_NAME, format!("request failed: {e}"))
                    }
                })?;

            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(ToolError::runtime(
                    TOOL_NAME,
                    format!("AI Pipe API error: {} - {}", status.as_u16(), text.trim()),
                ));
            }

            let completion: Value = response
                .json()
                .await
                .map_err(|e| ToolError::runtime(TOOL_NAME, format!("unreadable response: {e}")))?;

            parse_completion(&args.workflow, &completion)
        })
    }
}

/// Builds the prompt sent for a workflow; the kind is matched case-insensitively.
fn build_prompt(workflow: &str, data: &str) -> String {
    match workflow.to_lowercase().as_str() {
        "summarize" => format!("Please provide a concise summary of the following text:\n\n{data}"),
        "analyze" => format!("Please analyze the following data and provide insights:\n\n{data}"),
        "process" => format!("Please process and transform the following data:\n\n{data}"),
        _ => format!("Please help with the following task \"{workflow}\":\n\n{data}"),
    }
}

fn parse_completion(workflow: &str, completion: &Value) -> Result<Value, ToolError> {
    if let Some(message) = completion.pointer("/error/message").and_then(Value::as_str) {
        return Err(ToolError::runtime(TOOL_NAME, message));
    }

    let result = completion
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::runtime(TOOL_NAME, "response has no completion text"))?;

    Ok(json!({
        "success": true,
        "workflow": workflow,
        "result": result,
        "model_used": completion.get("model").cloned().unwrap_or(Value::Null),
        "tokens_used": completion.pointer("/usage/total_tokens").cloned().unwrap_or(Value::Null),
    }))
}
