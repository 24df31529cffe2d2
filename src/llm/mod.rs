//! Language model access.
//!
//! [`ModelClient`] is the seam the orchestrator calls through;
//! [`OpenAIClient`] implements it over an OpenAI-compatible chat
//! completions endpoint.

mod client;
mod config;
mod error;
mod openai;

pub use client::{ModelClient, ModelRequest, ModelResponse};
pub use config::{ProviderConfig, RetryConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};
pub use error::{LLMError, LLMErrorKind};
pub use openai::OpenAIClient;
