//! Configuration management for agentboard.
//!
//! Loads configuration from ${AGENTBOARD_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub mod paths {
    //! Path resolution for agentboard configuration.
    //!
    //! AGENTBOARD_HOME resolution order:
    //! 1. AGENTBOARD_HOME environment variable (if set)
    //! 2. ~/.config/agentboard (default)

    use std::path::PathBuf;

    /// Returns the agentboard home directory.
    ///
    /// Checks AGENTBOARD_HOME env var first, falls back to ~/.config/agentboard
    pub fn agentboard_home() -> PathBuf {
        if let Ok(home) = std::env::var("AGENTBOARD_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir()
            .map(|h| h.join(".config").join("agentboard"))
            .expect("Could not determine home directory")
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        agentboard_home().join("config.toml")
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the agents backend (overridable via AGENTBOARD_BASE_URL).
    pub base_url: Option<String>,

    /// Bearer token for the agents backend (optional; the backend may be local).
    pub api_key: Option<String>,

    /// Default model id offered for task planning.
    pub model: String,

    /// Maximum number of concurrently open session tabs.
    pub max_tabs: usize,
}

impl Config {
    const DEFAULT_MODEL: &str = "claude-sonnet-4-5";
    const DEFAULT_MAX_TABS: usize = 8;

    /// Loads configuration from the default config path.
    ///
    /// # Errors
    /// Returns an error if the operation fails.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the operation fails.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            model: Self::DEFAULT_MODEL.to_string(),
            max_tabs: Self::DEFAULT_MAX_TABS,
        }
    }
}
