//! OpenAI-compatible API client.
//!
//! HTTP client for the chat completions endpoint of OpenAI and compatible
//! servers (Ollama, vLLM, LocalAI, AI Pipe).

use crate::llm::client::{ModelClient, ModelRequest, ModelResponse};
use crate::llm::config::ProviderConfig;
use crate::llm::error::LLMError;
use crate::messages::{Message, MessageRole, StopReason, ToolCallRequest};
use crate::tools::ToolDefinition;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Client for OpenAI-compatible chat completions APIs.
#[derive(Debug, Clone)]
pub struct OpenAIClient {
    /// HTTP client
    client: Client,
    /// Connection settings
    config: ProviderConfig,
}

/// Request body for the chat completions API.
#[derive(Debug, Clone, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAITool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
    stream: bool,
}

/// A message in OpenAI format.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAIToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

/// A tool definition in OpenAI format.
#[derive(Debug, Clone, Serialize)]
struct OpenAITool {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: OpenAIFunction,
}

/// A function definition in OpenAI format.
#[derive(Debug, Clone, Serialize)]
struct OpenAIFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

/// A tool call in OpenAI format.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenAIToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    call_type: String,
    function: OpenAIFunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

/// A function call in OpenAI format. Arguments travel as JSON text.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenAIFunctionCall {
    name: String,
    arguments: String,
}

/// Non-streaming response from the API.
#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

/// A choice in the response.
#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionChoice {
    message: OpenAIMessage,
    finish_reason: Option<String>,
}

/// Error response from the API.
#[derive(Debug, Clone, Deserialize)]
struct OpenAIErrorResponse {
    error: OpenAIErrorDetail,
}

/// Error detail from the API.
#[derive(Debug, Clone, Deserialize)]
struct OpenAIErrorDetail {
    #[serde(rename = "type")]
    error_type: Option<String>,
    #[serde(default)]
    code: Option<String>,
    message: String,
}

impl OpenAIClient {
    /// Creates a new client.
    ///
    /// # Errors
    ///
    /// Returns `LLMError::network` if the HTTP client cannot be created.
    pub fn new(config: &ProviderConfig) -> Result<Self, LLMError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LLMError::network(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Returns the connection settings.
    #[must_use]
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Converts a request into API messages, system prompt first.
    fn convert_messages(system_prompt: Option<&str>, messages: &[Message]) -> Vec<OpenAIMessage> {
        let system = system_prompt
            .filter(|p| !p.is_empty())
            .map(|prompt| OpenAIMessage {
                role: "system".to_string(),
                content: Some(prompt.to_string()),
                tool_calls: None,
                tool_call_id: None,
            });

        system
            .into_iter()
            .chain(messages.iter().map(|msg| match msg.role {
                MessageRole::User => OpenAIMessage {
                    role: "user".to_string(),
                    content: Some(msg.text().to_string()),
                    tool_calls: None,
                    tool_call_id: None,
                },
                MessageRole::Assistant => {
                    let tool_calls = msg.has_tool_calls().then(|| {
                        msg.tool_calls
                            .iter()
                            .map(|tc| OpenAIToolCall {
                                id: tc.id.clone(),
                                call_type: function_type(),
                                function: OpenAIFunctionCall {
                                    name: tc.name.clone(),
                                    arguments: encode_arguments(&tc.arguments),
                                },
                            })
                            .collect()
                    });

                    OpenAIMessage {
                        role: "assistant".to_string(),
                        content: msg.content.clone().filter(|c| !c.is_empty()),
                        tool_calls,
                        tool_call_id: None,
                    }
                }
                MessageRole::Tool => OpenAIMessage {
                    role: "tool".to_string(),
                    content: Some(msg.text().to_string()),
                    tool_calls: None,
                    tool_call_id: msg.tool_call_id.clone(),
                },
            }))
            .collect()
    }

    /// Converts tool definitions to API format.
    fn convert_tools(tools: &[ToolDefinition]) -> Vec<OpenAITool> {
        tools
            .iter()
            .map(|t| OpenAITool {
                tool_type: "function",
                function: OpenAIFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.input_schema(),
                },
            })
            .collect()
    }

    /// Parses the API's finish reason.
    #[must_use]
    pub fn parse_stop_reason(reason: Option<&str>) -> StopReason {
        match reason {
            Some("length") => StopReason::MaxTokens,
            Some("tool_calls" | "function_call") => StopReason::ToolUse,
            Some("content_filter") => StopReason::StopSequence,
            _ => StopReason::EndTurn,
        }
    }

    fn build_body(&self, request: &ModelRequest) -> ChatCompletionRequest {
        let has_tools = !request.tools.is_empty();
        ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: Self::convert_messages(request.system_prompt.as_deref(), &request.messages),
            max_tokens: Some(self.config.max_tokens),
            temperature: Some(self.config.temperature),
            tools: has_tools.then(|| Self::convert_tools(&request.tools)),
            tool_choice: has_tools.then_some("auto"),
            stream: false,
        }
    }

    /// Builds the request with optional authorization header.
    fn build_request(&self, body: &ChatCompletionRequest) -> reqwest::RequestBuilder {
        let mut request = self
            .client
            .post(self.config.chat_completions_endpoint())
            .header("content-type", "application/json")
            .json(body);

        if !self.config.api_key.is_empty() {
            request = request.header("Authorization", format!("Bearer {}", self.config.api_key));
        }

        request
    }

    /// Parses an error response from the API.
    async fn parse_error_response(&self, response: reqwest::Response) -> LLMError {
        let status = response.status();
        let status_code = status.as_u16();

        if status_code == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);

            return LLMError::rate_limited(Duration::from_secs(retry_after));
        }

        let error_body = response.text().await.unwrap_or_default();
        parse_error_body(status_code, status.canonical_reason(), &error_body, &self.config.model)
    }

    async fn send_once(&self, body: &ChatCompletionRequest) -> Result<ModelResponse, LLMError> {
        let response = self.build_request(body).send().await.map_err(|e| {
            if e.is_timeout() {
                LLMError::timeout(self.config.timeout)
            } else {
                LLMError::network(format!("request failed: {}", e))
            }
        })?;

        if !response.status().is_success() {
            return Err(self.parse_error_response(response).await);
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LLMError::parse_error(format!("failed to parse response: {}", e)))?;

        parse_completion(completion)
    }
}

/// Encodes tool arguments as the JSON text the API expects.
fn encode_arguments(arguments: &serde_json::Value) -> String {
    match arguments {
        serde_json::Value::String(raw) => raw.clone(),
        other => other.to_string(),
    }
}

/// Decodes tool arguments. Text that is not JSON is kept as a string so
/// argument validation can reject it with a proper tool result.
fn decode_arguments(raw: &str) -> serde_json::Value {
    if raw.trim().is_empty() {
        return serde_json::Value::Object(serde_json::Map::new());
    }
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

fn parse_completion(completion: ChatCompletionResponse) -> Result<ModelResponse, LLMError> {
    let choice = completion
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LLMError::parse_error("response contained no choices"))?;

    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| {
            ToolCallRequest::new(tc.id, tc.function.name, decode_arguments(&tc.function.arguments))
        })
        .collect::<Vec<_>>();

    Ok(ModelResponse {
        text: choice.message.content.filter(|c| !c.is_empty()),
        tool_calls,
        stop_reason: OpenAIClient::parse_stop_reason(choice.finish_reason.as_deref()),
    })
}

fn parse_error_body(
    status_code: u16,
    canonical_reason: Option<&str>,
    error_body: &str,
    model: &str,
) -> LLMError {
    if let Ok(api_error) = serde_json::from_str::<OpenAIErrorResponse>(error_body) {
        let error_type = api_error
            .error
            .error_type
            .as_deref()
            .or(api_error.error.code.as_deref())
            .unwrap_or("unknown");

        match error_type {
            "authentication_error" | "invalid_api_key" => {
                LLMError::authentication_failed(&api_error.error.message)
            }
            "invalid_request_error" => LLMError::invalid_request(&api_error.error.message),
            "server_overloaded" | "overloaded_error" => LLMError::model_overloaded(model),
            _ => LLMError::api_error(
                status_code,
                api_error.error.message,
                api_error.error.error_type,
            ),
        }
    } else {
        LLMError::api_error(
            status_code,
            if error_body.is_empty() {
                canonical_reason.unwrap_or("Unknown error")
            } else {
                error_body
            },
            None,
        )
    }
}

#[async_trait]
impl ModelClient for OpenAIClient {
    async fn call(&self, request: ModelRequest) -> Result<ModelResponse, LLMError> {
        let body = self.build_body(&request);
        let retry = self.config.retry;
        let mut attempt = 0;

        loop {
            match self.send_once(&body).await {
                Ok(response) => {
                    debug!(
                        model = %self.config.model,
                        tool_calls = response.tool_calls.len(),
                        stop_reason = ?response.stop_reason,
                        "model answered"
                    );
                    return Ok(response);
                }
                Err(error) if error.is_unavailable() && attempt < retry.max_retries => {
                    attempt += 1;
                    let backoff = error
                        .retry_after()
                        .unwrap_or_else(|| retry.backoff_for_attempt(attempt))
                        .min(retry.max_backoff);
                    warn!(
                        %error,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        "model request failed; retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(error) => return Err(error),
            }
        }
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}
