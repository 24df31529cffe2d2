//! Google search built-in tool.
//!
//! Queries the Google Custom Search JSON API.

use crate::config::SearchConfig;
use crate::tools::{
    ArgumentSchema, Capability, FieldType, ToolDefinition, ToolError, ToolFuture, ToolHandler,
};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

const TOOL_NAME: &str = "google_search";

/// Results requested when the model does not say.
pub const DEFAULT_NUM_RESULTS: u32 = 5;

/// The API returns at most ten results per request.
const MAX_NUM_RESULTS: u32 = 10;

/// Google search tool.
///
/// Credentials are read from the environment on every call, so a key exported
/// after startup is picked up without restarting.
#[derive(Debug, Clone)]
pub struct GoogleSearchTool {
    client: reqwest::Client,
    config: SearchConfig,
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default)]
    num_results: Option<f64>,
}

impl GoogleSearchTool {
    /// Creates the tool.
    ///
    /// # Errors
    ///
    /// Returns a runtime error if the HTTP client cannot be built.
    pub fn new(config: SearchConfig) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("agentloop/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ToolError::runtime(TOOL_NAME, format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Returns the definition shown to the model.
    #[must_use]
    pub fn definition() -> ToolDefinition {
        ToolDefinition::new(
            TOOL_NAME,
            "Search the web with Google and return the top results with title, snippet and link.",
            ArgumentSchema::new()
                .required("query", FieldType::String, "The search query")
                .optional(
                    "num_results",
                    FieldType::Integer,
                    "Number of results to return (default 5, max 10)",
                ),
            Capability::NetworkRead,
        )
    }
}

impl ToolHandler for GoogleSearchTool {
    fn call(&self, args: Value) -> ToolFuture {
        let client = self.client.clone();
        let config = self.config.clone();

        Box::pin(async move {
            let args: SearchArgs = serde_json::from_value(args)
                .map_err(|e| ToolError::invalid_arguments(TOOL_NAME, e.to_string()))?;
            if args.query.trim().is_empty() {
                return Err(ToolError::invalid_arguments(TOOL_NAME, "query cannot be empty"));
            }

            let api_key = config.resolve_api_key().ok_or_else(|| {
                ToolError::runtime(
                    TOOL_NAME,
                    format!("no API key; set the {} environment variable", config.api_key_env),
                )
            })?;
            let engine_id = config.resolve_engine_id().ok_or_else(|| {
                ToolError::runtime(
                    TOOL_NAME,
                    format!(
                        "no search engine id; set the {} environment variable",
                        config.engine_id_env
                    ),
                )
            })?;

            let num = clamp_num_results(args.num_results);
            let url = build_url(&config.base_url, &api_key, &engine_id, &args.query, num)?;
            tracing::debug!(query = %args.query, num, "running google search");

            let response = client.get(url).send().await.map_err(|e| {
                if e.is_timeout() {
                    ToolError::timeout(TOOL_NAME, Duration::from_secs(config.timeout_secs))
                } else {
                    ToolError::runtime(TOOL_NAME, format!("request failed: {e}"))
                }
            })?;

            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|e| ToolError::runtime(TOOL_NAME, format!("failed to read response: {e}")))?;

            interpret_response(status, &text)
        })
    }
}

/// Turns a status and raw body into results or a tool error.
///
/// A success status with a body that is not JSON is an error, never an
/// empty result list.
fn interpret_response(status: StatusCode, text: &str) -> Result<Value, ToolError> {
    if !status.is_success() {
        let body: Value = serde_json::from_str(text).unwrap_or(Value::Null);
        let reason = api_error_message(&body)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string());
        return Err(ToolError::runtime(
            TOOL_NAME,
            format!("Google Search API error: {} - {}", status.as_u16(), reason),
        ));
    }

    let body: Value = serde_json::from_str(text)
        .map_err(|e| ToolError::runtime(TOOL_NAME, format!("unreadable response: {e}")))?;
    parse_results(&body)
}

/// Clamps the requested result count into the range the API accepts.
fn clamp_num_results(requested: Option<f64>) -> u32 {
    match requested {
        None => DEFAULT_NUM_RESULTS,
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Some(n) => n.clamp(1.0, f64::from(MAX_NUM_RESULTS)) as u32,
    }
}

fn build_url(
    base_url: &str,
    api_key: &str,
    engine_id: &str,
    query: &str,
    num: u32,
) -> Result<Url, ToolError> {
    Url::parse_with_params(
        base_url,
        &[
            ("key", api_key),
            ("cx", engine_id),
            ("q", query),
            ("num", &num.to_string()),
        ],
    )
    .map_err(|e| ToolError::runtime(TOOL_NAME, format!("invalid search URL '{base_url}': {e}")))
}

fn api_error_message(body: &Value) -> Option<String> {
    body.get("error")
        .and_then(|error| error.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Converts an API response body into the tool payload.
fn parse_results(body: &Value) -> Result<Value, ToolError> {
    if let Some(message) = api_error_message(body) {
        return Err(ToolError::runtime(TOOL_NAME, message));
    }

    let results: Vec<Value> = body
        .get("items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| {
                    json!({
                        "title": item.get("title").cloned().unwrap_or(Value::Null),
                        "snippet": item.get("snippet").cloned().unwrap_or(Value::Null),
                        "link": item.get("link").cloned().unwrap_or(Value::Null),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let total_results = body
        .pointer("/searchInformation/totalResults")
        .and_then(Value::as_str)
        .unwrap_or("0");

    Ok(json!({
        "success": true,
        "results": results,
        "total_results": total_results,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definition_declares_query_and_count() {
        let definition = GoogleSearchTool::definition();
        assert_eq!(definition.name, "google_search");
        assert_eq!(definition.capability, Capability::NetworkRead);
        let schema = definition.input_schema();
        assert_eq!(schema["required"], json!(["query"]));
        assert_eq!(schema["properties"]["num_results"]["type"], "integer");
    }

    #[test]
    fn num_results_is_clamped() {
        assert_eq!(clamp_num_results(None), 5);
        assert_eq!(clamp_num_results(Some(0.0)), 1);
        assert_eq!(clamp_num_results(Some(3.0)), 3);
        assert_eq!(clamp_num_results(Some(50.0)), 10);
    }

    #[test]
    fn url_carries_all_parameters_encoded() {
        let url = build_url(
            "https://www.googleapis.com/customsearch/v1",
            "k",
            "cx1",
            "rust & tokio",
            3,
        )
        .unwrap();

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("key".to_string(), "k".to_string()),
                ("cx".to_string(), "cx1".to_string()),
                ("q".to_string(), "rust & tokio".to_string()),
                ("num".to_string(), "3".to_string()),
            ]
        );
    }

    #[test]
    fn parses_items_and_total() {
        let body = json!({
            "searchInformation": {"totalResults": "1200"},
            "items": [
                {"title": "Tokio", "snippet": "An async runtime", "link": "https://tokio.rs", "kind": "x"},
                {"title": "Rhai", "snippet": "Embedded scripting", "link": "https://rhai.rs"}
            ]
        });

        let payload = parse_results(&body).unwrap();

        assert_eq!(payload["success"], true);
        assert_eq!(payload["total_results"], "1200");
        assert_eq!(payload["results"].as_array().unwrap().len(), 2);
        assert_eq!(
            payload["results"][0],
            json!({"title": "Tokio", "snippet": "An async runtime", "link": "https://tokio.rs"})
        );
    }

    #[test]
    fn no_items_means_empty_results() {
        let payload = parse_results(&json!({})).unwrap();
        assert_eq!(payload["results"], json!([]));
        assert_eq!(payload["total_results"], "0");
    }

    #[test]
    fn error_body_is_a_runtime_error() {
        let body = json!({"error": {"code": 400, "message": "API key not valid"}});
        let error = parse_results(&body).unwrap_err();
        assert!(error.is_runtime_error());
        assert!(error.to_string().contains("API key not valid"));
    }

    #[test]
    fn non_json_success_body_is_a_runtime_error() {
        let error = interpret_response(StatusCode::OK, "<html>captcha</html>").unwrap_err();
        assert!(error.is_runtime_error());
        assert!(error.to_string().contains("unreadable response"));
    }

    #[test]
    fn json_success_body_is_parsed() {
        let payload = interpret_response(
            StatusCode::OK,
            r#"{"searchInformation": {"totalResults": "3"}, "items": []}"#,
        )
        .unwrap();
        assert_eq!(payload["total_results"], "3");
    }

    #[test]
    fn failure_status_uses_api_message_or_reason() {
        let error = interpret_response(
            StatusCode::FORBIDDEN,
            r#"{"error": {"message": "Daily limit exceeded"}}"#,
        )
        .unwrap_err();
        assert!(error.to_string().contains("403 - Daily limit exceeded"));

        let error = interpret_response(StatusCode::BAD_GATEWAY, "not json").unwrap_err();
        assert!(error.to_string().contains("502 - Bad Gateway"));
    }

    #[tokio::test]
    async fn missing_credentials_name_the_variable() {
        let tool = GoogleSearchTool::new(SearchConfig {
            api_key_env: "AGENTLOOP_TEST_NO_GOOGLE_KEY".to_string(),
            ..SearchConfig::default()
        })
        .unwrap();

        let error = tool.call(json!({"query": "rust"})).await.unwrap_err();

        assert!(error.is_runtime_error());
        assert!(error.to_string().contains("AGENTLOOP_TEST_NO_GOOGLE_KEY"));
    }

    #[tokio::test]
    async fn blank_query_is_rejected() {
        let tool = GoogleSearchTool::new(SearchConfig::default()).unwrap();
        let error = tool.call(json!({"query": "  "})).await.unwrap_err();
        assert!(error.is_invalid_arguments());
    }
}
