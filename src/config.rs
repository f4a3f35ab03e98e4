//! Configuration for market-ledger

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{LedgerError, Result};

/// Default data directory
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("market-ledger")
}

fn default_db_path() -> PathBuf {
    default_data_dir().join("ledger.db")
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_max_age_hours() -> i64 {
    24
}

/// Remote ledger API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the remote ledger API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Optional API key sent as a bearer token
    #[serde(default)]
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            timeout_secs: default_timeout(),
        }
    }
}

/// Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the local SQLite mirror
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Remote ledger API settings
    #[serde(default)]
    pub remote: RemoteConfig,

    /// A sync is considered due once the last successful sync is older than this
    #[serde(default = "default_max_age_hours")]
    pub sync_max_age_hours: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            remote: RemoteConfig::default(),
            sync_max_age_hours: default_max_age_hours(),
        }
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| LedgerError::Config(e.to_string()))
    }

    /// Save config to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| LedgerError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.remote.base_url, "http://localhost:8080");
        assert_eq!(config.remote.timeout_secs, 30);
        assert_eq!(config.sync_max_age_hours, 24);
        assert!(config.remote.api_key.is_none());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [remote]
            base_url = "https://ledger.example.org"
            "#,
        )
        .unwrap();
        assert_eq!(config.remote.base_url, "https://ledger.example.org");
        assert_eq!(config.remote.timeout_secs, 30);
        assert_eq!(config.sync_max_age_hours, 24);
    }
}
