//! Configuration management for Toolpipe
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! environment variables. The CLI applies its own flags last and calls
//! [`Config::validate`] once before anything is spawned.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::orchestration::SystemPrompt;

/// Default values used when nothing else is configured
pub mod defaults {
    pub const MODEL: &str = "gpt-4o-mini";
    pub const MAX_TOKENS: u32 = 1000;
    pub const MAX_TOOL_ROUNDS: usize = 1;
    pub const PYTHON_COMMAND: &str = "python";
    pub const NODE_COMMAND: &str = "node";
}

/// Environment variable names
pub mod env_vars {
    pub const MODEL: &str = "LLM_MODEL";
    pub const BASE_URL: &str = "LLM_BASE_URL";
    pub const API_KEY: &str = "LLM_API_KEY";
    pub const FALLBACK_API_KEY: &str = "OPENAI_API_KEY";
    pub const MAX_TOKENS: &str = "MAX_TOKENS";
    pub const SYSTEM_PROMPT: &str = "SYSTEM_PROMPT";
    pub const MAX_TOOL_ROUNDS: &str = "MAX_TOOL_ROUNDS";
    pub const PYTHON_COMMAND: &str = "PYTHON_COMMAND";
    pub const NODE_COMMAND: &str = "NODE_COMMAND";
}

/// Main application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Chat-completion model name
    pub model: String,
    /// Base URL of the OpenAI-compatible API
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Bearer token for the completion API
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Cap on tokens generated per completion round
    pub max_tokens: u32,
    /// System turn seeded once per session; `None` disables it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Tool rounds allowed per query
    pub max_tool_rounds: usize,
    /// Re-list the tool catalog before every query
    pub refresh_tools_per_query: bool,
    /// Validate tool arguments against each tool's input schema before dispatch
    pub strict_arguments: bool,
    /// Interpreter for `.py` tool host scripts
    pub python_command: String,
    /// Interpreter for `.js` tool host scripts
    pub node_command: String,
    /// Extra environment passed to the tool host process
    pub server_env: HashMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: defaults::MODEL.to_string(),
            base_url: None,
            api_key: None,
            max_tokens: defaults::MAX_TOKENS,
            system_prompt: Some(SystemPrompt::new().build()),
            max_tool_rounds: defaults::MAX_TOOL_ROUNDS,
            refresh_tools_per_query: false,
            strict_arguments: false,
            python_command: defaults::PYTHON_COMMAND.to_string(),
            node_command: defaults::NODE_COMMAND.to_string(),
            server_env: HashMap::new(),
        }
    }
}

impl Config {
    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_with(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(model) = get(env_vars::MODEL) {
            self.model = model;
        }
        if let Some(url) = get(env_vars::BASE_URL) {
            self.base_url = Some(url);
        }
        if let Some(key) = get(env_vars::API_KEY).or_else(|| get(env_vars::FALLBACK_API_KEY)) {
            self.api_key = Some(key);
        }
        if let Some(raw) = get(env_vars::MAX_TOKENS) {
            self.max_tokens = parse_number(env_vars::MAX_TOKENS, &raw)?;
        }
        if let Some(raw) = get(env_vars::MAX_TOOL_ROUNDS) {
            self.max_tool_rounds = parse_number(env_vars::MAX_TOOL_ROUNDS, &raw)?;
        }
        // An explicitly empty SYSTEM_PROMPT turns the system turn off.
        if let Some(prompt) = lookup(env_vars::SYSTEM_PROMPT) {
            self.system_prompt = if prompt.trim().is_empty() { None } else { Some(prompt) };
        }
        if let Some(cmd) = get(env_vars::PYTHON_COMMAND) {
            self.python_command = cmd;
        }
        if let Some(cmd) = get(env_vars::NODE_COMMAND) {
            self.node_command = cmd;
        }

        Ok(())
    }

    /// The API key, if one is configured and non-empty
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }

    /// The system prompt; a blank one, from any layer, disables the system turn
    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref().filter(|p| !p.trim().is_empty())
    }

    /// Check settings that must hold before a session starts
    pub fn validate(&self) -> Result<()> {
        if self.api_key().is_none() {
            return Err(Error::Config(format!(
                "No API key configured: set {} (or {})",
                env_vars::API_KEY,
                env_vars::FALLBACK_API_KEY
            )));
        }
        if self.model.trim().is_empty() {
            return Err(Error::Config("Model name must not be empty".to_string()));
        }
        if self.max_tokens == 0 {
            return Err(Error::Config("max_tokens must be greater than zero".to_string()));
        }
        if self.max_tool_rounds == 0 {
            return Err(Error::Config("max_tool_rounds must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn parse_number<N: std::str::FromStr>(name: &str, raw: &str) -> Result<N> {
    raw.trim()
        .parse()
        .map_err(|_| Error::Config(format!("{} must be a positive integer, got '{}'", name, raw)))
}

/// Loads configuration from disk and the environment
pub struct ConfigManager {
    config_path: PathBuf,
    config: Config,
}

impl ConfigManager {
    /// Load from the default path (a missing file means defaults)
    pub fn new() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        let config = if config_path.exists() {
            Self::load_from_path(&config_path)?
        } else {
            Config::default()
        };

        Ok(Self { config_path, config })
    }

    /// Load from an explicit path, which must exist
    pub fn with_path(config_path: PathBuf) -> Result<Self> {
        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }
        let config = Self::load_from_path(&config_path)?;
        Ok(Self { config_path, config })
    }

    /// Get the default config path
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not find config directory".to_string()))?;

        Ok(config_dir.join("toolpipe").join("config.toml"))
    }

    fn load_from_path(path: &Path) -> Result<Config> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;

        toml::from_str(&content).map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Path the configuration was (or would be) read from
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Consume the manager, applying environment overrides
    pub fn into_config(mut self) -> Result<Config> {
        self.config.apply_env()?;
        Ok(self.config)
    }
}
