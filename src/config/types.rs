//! Configuration file types.
//!
//! Every section and every field is optional; anything left out takes the
//! default shown here. Secrets never live in the file, only the names of the
//! environment variables that hold them.

use crate::error::AgentLoopError;
use crate::llm::{ProviderConfig, RetryConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::logging::LoggingConfig;
use crate::orchestrator::OrchestratorConfig;
use crate::tools::sandbox::SandboxConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Root configuration structure.
///
/// ```toml
/// [model]
/// model = "gpt-4o"
/// api_key_env = "OPENAI_API_KEY"
///
/// [agent]
/// system_prompt = "You are a research assistant."
/// max_tool_rounds = 8
///
/// [sandbox]
/// timeout_ms = 2000
///
/// [search]
/// api_key_env = "GOOGLE_API_KEY"
/// engine_id_env = "GOOGLE_CSE_ID"
///
/// [workflow]
/// token_env = "AIPIPE_TOKEN"
///
/// [logging]
/// level = "debug"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentLoopConfig {
    /// The conversation model
    pub model: ModelFileConfig,
    /// Orchestrator settings
    pub agent: OrchestratorConfig,
    /// Script sandbox limits
    pub sandbox: SandboxConfig,
    /// `google_search` tool settings
    pub search: SearchConfig,
    /// `ai_pipe_workflow` tool settings
    pub workflow: WorkflowConfig,
    /// File logging
    pub logging: LoggingConfig,
}

impl AgentLoopConfig {
    /// Creates a configuration with every default.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks values that parse but cannot work.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error naming the offending field.
    pub fn validate(&self) -> Result<(), AgentLoopError> {
        self.model.validate()?;
        self.sandbox.validate()?;

        if self.agent.max_tool_rounds == Some(0) {
            return Err(AgentLoopError::configuration(
                "agent.max_tool_rounds",
                "must be at least 1; omit it for no cap",
            ));
        }

        check_url("search.base_url", &self.search.base_url)?;
        check_url("workflow.base_url", &self.workflow.base_url)?;
        Ok(())
    }
}

/// The `[model]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelFileConfig {
    /// Model name
    pub model: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Base URL of the OpenAI-compatible API
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Maximum tokens per answer
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// Retries for unavailable errors; 0 disables retrying
    pub max_retries: u32,
}

impl Default for ModelFileConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 120,
            max_tokens: 4096,
            temperature: 0.7,
            max_retries: 0,
        }
    }
}

impl ModelFileConfig {
    /// Reads the API key from the configured environment variable.
    ///
    /// Returns an empty string when it is unset, which local servers accept.
    #[must_use]
    pub fn resolve_api_key(&self) -> String {
        read_env(&self.api_key_env).unwrap_or_default()
    }

    /// Converts this section into runtime client settings.
    #[must_use]
    pub fn to_provider_config(&self) -> ProviderConfig {
        ProviderConfig::openai(self.resolve_api_key())
            .with_model(&self.model)
            .with_base_url(&self.base_url)
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature)
            .with_retry(RetryConfig::new(self.max_retries))
    }

    fn validate(&self) -> Result<(), AgentLoopError> {
        if self.model.trim().is_empty() {
            return Err(AgentLoopError::configuration("model.model", "must not be empty"));
        }
        if self.timeout_secs == 0 {
            return Err(AgentLoopError::configuration(
                "model.timeout_secs",
                "must be greater than zero",
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(AgentLoopError::configuration(
                "model.temperature",
                format!("{} is outside 0.0..=2.0", self.temperature),
            ));
        }
        check_url("model.base_url", &self.base_url)
    }
}

/// The `[search]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Environment variable holding the Google API key
    pub api_key_env: String,
    /// Environment variable holding the custom search engine id
    pub engine_id_env: String,
    /// Custom Search JSON API endpoint
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key_env: "GOOGLE_API_KEY".to_string(),
            engine_id_env: "GOOGLE_CSE_ID".to_string(),
            base_url: "https://www.googleapis.com/customsearch/v1".to_string(),
            timeout_secs: 30,
        }
    }
}

impl SearchConfig {
    /// Reads the API key, if set.
    #[must_use]
    pub fn resolve_api_key(&self) -> Option<String> {
        read_env(&self.api_key_env)
    }

    /// Reads the search engine id, if set.
    #[must_use]
    pub fn resolve_engine_id(&self) -> Option<String> {
        read_env(&self.engine_id_env)
    }
}

/// The `[workflow]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Environment variable holding the AI Pipe token
    pub token_env: String,
    /// Base URL of the OpenAI-compatible proxy
    pub base_url: String,
    /// Model used for workflow prompts
    pub model: String,
    /// Maximum tokens per workflow answer
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            token_env: "AIPIPE_TOKEN".to_string(),
            base_url: "https://aipipe.org/openai/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: 500,
            temperature: 0.7,
            timeout_secs: 60,
        }
    }
}

impl WorkflowConfig {
    /// Reads the token, if set.
    #[must_use]
    pub fn resolve_token(&self) -> Option<String> {
        read_env(&self.token_env)
    }
}

fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn check_url(field: &str, value: &str) -> Result<(), AgentLoopError> {
    let url = Url::parse(value)
        .map_err(|e| AgentLoopError::configuration(field, format!("'{value}' is not a URL: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(AgentLoopError::configuration(
            field,
            format!("unsupported scheme '{scheme}'; use http or https"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AgentLoopConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.model.model, "gpt-4o");
        assert_eq!(config.model.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.search.engine_id_env, "GOOGLE_CSE_ID");
        assert_eq!(config.workflow.model, "gpt-4o-mini");
        assert_eq!(config.workflow.max_tokens, 500);
        assert!(config.agent.max_tool_rounds.is_none());
    }

    #[test]
    fn model_section_maps_to_provider_config() {
        let section = ModelFileConfig {
            model: "llama3.2".to_string(),
            api_key_env: "AGENTLOOP_TEST_UNSET_KEY".to_string(),
            base_url: "http://localhost:11434/v1".to_string(),
            timeout_secs: 300,
            max_tokens: 1024,
            temperature: 0.1,
            max_retries: 3,
        };

        let provider = section.to_provider_config();

        assert_eq!(provider.model, "llama3.2");
        assert!(provider.api_key.is_empty());
        assert_eq!(provider.timeout, Duration::from_secs(300));
        assert_eq!(provider.max_tokens, 1024);
        assert_eq!(provider.retry.max_retries, 3);
        assert_eq!(
            provider.chat_completions_endpoint(),
            "http://localhost:11434/v1/chat/completions"
        );
    }

    #[test]
    fn zero_round_cap_is_rejected() {
        let mut config = AgentLoopConfig::default();
        config.agent.max_tool_rounds = Some(0);
        let error = config.validate().unwrap_err();
        assert!(error.is_configuration());
        assert!(error.to_string().contains("agent.max_tool_rounds"));
    }

    #[test]
    fn bad_urls_are_rejected() {
        let mut config = AgentLoopConfig::default();
        config.workflow.base_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());

        let mut config = AgentLoopConfig::default();
        config.model.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn out_of_range_temperature_is_rejected() {
        let mut config = AgentLoopConfig::default();
        config.model.temperature = 3.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unset_credentials_resolve_to_none() {
        let search = SearchConfig {
            api_key_env: "AGENTLOOP_TEST_UNSET_SEARCH_KEY".to_string(),
            ..SearchConfig::default()
        };
        assert!(search.resolve_api_key().is_none());
    }
}
