//! Configuration file loading.

use crate::config::types::AgentLoopConfig;
use crate::error::AgentLoopError;
use std::path::{Path, PathBuf};

/// Project-local config file name.
const LOCAL_CONFIG_NAME: &str = "agentloop.toml";

/// File name inside the per-user config directory.
const XDG_CONFIG_NAME: &str = "config.toml";

const APP_NAME: &str = "agentloop";

/// Loads configuration from the default search paths.
///
/// Search order:
/// 1. `./agentloop.toml` (project-local)
/// 2. `~/.config/agentloop/config.toml` (XDG config)
///
/// Returns the defaults if neither file exists.
///
/// # Errors
///
/// Returns a `Configuration` error if a file exists but cannot be read,
/// parsed or validated.
pub fn load() -> Result<AgentLoopConfig, AgentLoopError> {
    for path in search_paths() {
        if path.exists() {
            tracing::debug!(path = %path.display(), "loading config file");
            return from_path(&path);
        }
    }

    tracing::debug!("no config file found; using defaults");
    Ok(AgentLoopConfig::default())
}

/// Loads and validates configuration from a specific file.
///
/// # Errors
///
/// Returns a `Configuration` error if:
/// - The file cannot be read
/// - The file contains invalid TOML
/// - A value fails validation
pub fn from_path(path: &Path) -> Result<AgentLoopConfig, AgentLoopError> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        AgentLoopError::configuration(
            "config_file",
            format!("failed to read '{}': {}", path.display(), e),
        )
    })?;

    from_str(&contents).map_err(|e| {
        AgentLoopError::configuration(
            "config_file",
            format!("'{}': {}", path.display(), e),
        )
    })
}

/// Parses and validates configuration from a TOML string.
///
/// # Errors
///
/// Returns a `Configuration` error if the TOML is invalid, has unknown
/// value types, or fails [`AgentLoopConfig::validate`].
///
/// # Example
///
/// ```rust
/// let config = agentloop::config::from_str(r#"
/// [agent]
/// max_tool_rounds = 4
/// "#).unwrap();
///
/// assert_eq!(config.agent.max_tool_rounds, Some(4));
/// ```
pub fn from_str(toml_str: &str) -> Result<AgentLoopConfig, AgentLoopError> {
    let config: AgentLoopConfig = toml::from_str(toml_str)
        .map_err(|e| AgentLoopError::configuration("config", format!("invalid TOML: {e}")))?;
    config.validate()?;
    Ok(config)
}

/// Returns the paths [`load`] checks, in order.
#[must_use]
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(LOCAL_CONFIG_NAME)];

    if let Some(dir) = xdg_config_dir() {
        paths.push(dir.join(XDG_CONFIG_NAME));
    }

    paths
}

/// Returns the per-user config directory, `~/.config/agentloop` on most systems.
#[must_use]
pub fn xdg_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(APP_NAME))
}
