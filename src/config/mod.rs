//! Configuration loading.
//!
//! Configuration is stored in TOML. The search order is:
//! 1. `./agentloop.toml` (project-local)
//! 2. `~/.config/agentloop/config.toml` (XDG config)
//!
//! A missing file is not an error; every value has a default. Credentials
//! are read from environment variables whose names the file may override.
//!
//! # Example Configuration
//!
//! ```toml
//! [model]
//! model = "gpt-4o"
//! api_key_env = "OPENAI_API_KEY"
//! base_url = "https://api.openai.com/v1"
//! timeout_secs = 120
//! max_retries = 0
//!
//! [agent]
//! system_prompt = "You are a helpful research assistant."
//! max_tool_rounds = 8
//!
//! [sandbox]
//! timeout_ms = 5000
//! max_operations = 50000000
//!
//! [search]
//! api_key_env = "GOOGLE_API_KEY"
//! engine_id_env = "GOOGLE_CSE_ID"
//!
//! [workflow]
//! token_env = "AIPIPE_TOKEN"
//! model = "gpt-4o-mini"
//!
//! [logging]
//! level = "info"
//! ```

mod file;
mod types;

pub use file::{from_path, from_str, load, search_paths, xdg_config_dir};
pub use types::{AgentLoopConfig, ModelFileConfig, SearchConfig, WorkflowConfig};
