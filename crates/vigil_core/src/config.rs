//! Vigil configuration
//!
//! Optional TOML defaults for thresholds and retention; command-line
//! flags always win over config values.
//! Config file: ~/.config/vigil/config.toml or /etc/vigil/config.toml

use crate::compact::RetentionPolicy;
use crate::window::SloThresholds;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main Vigil configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VigilConfig {
    /// SLO threshold defaults
    #[serde(default)]
    pub thresholds: SloThresholds,

    /// Retention policy defaults
    #[serde(default)]
    pub retention: RetentionPolicy,

    /// Default trailing window size
    #[serde(default = "default_last")]
    pub last: usize,
}

fn default_last() -> usize {
    20
}

impl Default for VigilConfig {
    fn default() -> Self {
        Self {
            thresholds: SloThresholds::default(),
            retention: RetentionPolicy::default(),
            last: default_last(),
        }
    }
}

impl VigilConfig {
    /// Get user config path: ~/.config/vigil/config.toml
    pub fn user_config_path() -> Result<PathBuf> {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            return Ok(Path::new(&xdg).join("vigil").join("config.toml"));
        }
        let home = std::env::var("HOME").context("Cannot determine home directory")?;
        Ok(Path::new(&home).join(".config").join("vigil").join("config.toml"))
    }

    /// Get system config path: /etc/vigil/config.toml
    pub fn system_config_path() -> PathBuf {
        PathBuf::from("/etc/vigil/config.toml")
    }

    /// Load configuration.
    ///
    /// Priority:
    /// 1. $VIGIL_CONFIG (explicit override)
    /// 2. User config (~/.config/vigil/config.toml)
    /// 3. System config (/etc/vigil/config.toml)
    /// 4. Defaults
    pub fn load() -> Result<Self> {
        if let Ok(explicit) = std::env::var("VIGIL_CONFIG") {
            return Self::load_from_path(Path::new(&explicit));
        }

        if let Ok(user_path) = Self::user_config_path() {
            if user_path.exists() {
                return Self::load_from_path(&user_path);
            }
        }

        let system_path = Self::system_config_path();
        if system_path.exists() {
            return Self::load_from_path(&system_path);
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: VigilConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }
}
