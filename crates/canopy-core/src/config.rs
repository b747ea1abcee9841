//! Configuration management for Canopy
//!
//! This module handles loading, saving, and validating the project-specific
//! configuration stored in `.canopy/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the per-project configuration directory
pub const CONFIG_DIR_NAME: &str = ".canopy";

/// Default number of dispatch rounds per user request
pub const DEFAULT_MAX_ROUNDS: u32 = 5;

/// Errors that can occur during configuration operations
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error while reading or writing config file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure for Canopy
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Model transport settings
    #[serde(default)]
    pub transport: TransportConfig,

    /// Workspace persistence settings
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    /// Project root directory
    #[serde(skip)]
    pub root: Option<PathBuf>,
}

/// Agent loop configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    /// Model to use (e.g., "gemini-2.5-flash")
    #[serde(default = "default_model")]
    pub model: String,

    /// Dispatch rounds allowed before the loop stops on its own
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,

    /// System instruction sent with every request
    #[serde(default = "default_system_instruction")]
    pub system_instruction: Option<String>,
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_max_rounds() -> u32 {
    DEFAULT_MAX_ROUNDS
}

fn default_system_instruction() -> Option<String> {
    Some(
        "You are an expert AI coding assistant with access to a virtual file system. \
         Use the provided tools to list, read, create, update and delete files, \
         then tell the user what you did."
            .to_string(),
    )
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_rounds: default_max_rounds(),
            system_instruction: default_system_instruction(),
        }
    }
}

/// Model transport configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransportConfig {
    /// Base URL of the generative language API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Relay that forwards requests and holds the credential itself
    #[serde(default)]
    pub relay_url: Option<String>,
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            relay_url: None,
        }
    }
}

/// Workspace persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkspaceConfig {
    /// State file name, relative to the config directory
    #[serde(default = "default_state_file")]
    pub state_file: String,
}

fn default_state_file() -> String {
    "state.json".to_string()
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
        }
    }
}

impl Config {
    /// Load configuration from a .canopy directory
    pub fn load<P: AsRef<Path>>(project_root: P) -> Result<Self, ConfigError> {
        let config_path = project_root.as_ref().join(CONFIG_DIR_NAME).join("config.toml");

        if !config_path.exists() {
            tracing::debug!("No config at {}, using defaults", config_path.display());
            let mut config = Config::default();
            config.root = Some(project_root.as_ref().to_path_buf());
            return Ok(config);
        }

        let contents = std::fs::read_to_string(&config_path)?;
        let mut config: Config = toml::from_str(&contents)?;
        config.root = Some(project_root.as_ref().to_path_buf());
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to a .canopy directory
    pub fn save<P: AsRef<Path>>(&self, project_root: P) -> Result<(), ConfigError> {
        let config_dir = project_root.as_ref().join(CONFIG_DIR_NAME);
        let config_path = config_dir.join("config.toml");

        if !config_dir.exists() {
            std::fs::create_dir_all(&config_dir)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, contents)?;

        Ok(())
    }

    /// Reject settings the agent loop cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.max_rounds == 0 {
            return Err(ConfigError::Invalid(
                "agent.max_rounds must be at least 1".to_string(),
            ));
        }
        if self.agent.model.trim().is_empty() {
            return Err(ConfigError::Invalid("agent.model must not be empty".to_string()));
        }
        Ok(())
    }

    /// Get the config directory path
    pub fn config_dir(&self) -> Option<PathBuf> {
        self.root.as_ref().map(|root| root.join(CONFIG_DIR_NAME))
    }

    /// Get the persisted workspace state path
    pub fn state_path(&self) -> Option<PathBuf> {
        self.config_dir().map(|dir| dir.join(&self.workspace.state_file))
    }
}
