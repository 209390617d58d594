//! Configuration file handling.
//!
//! # Configuration Location
//!
//! - Linux: `~/.config/phishscan/config.toml`
//! - macOS: `~/Library/Application Support/phishscan/config.toml`
//! - Windows: `%APPDATA%\phishscan\config.toml`
//!
//! # Example Configuration
//!
//! ```toml
//! default_mode = "cloud"
//! cache_max_entries = 100
//! max_content_chars = 20000
//! extension_origin = "chrome-extension://phishscan/"
//!
//! [cloud]
//! endpoint = "https://api.phishscan.dev/v1/analyze"
//! model = "phishscan-cloud-1"
//! request_timeout_secs = 45
//!
//! [local]
//! endpoint = "http://localhost:11434"
//! model = "gemma3:1b"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::model::Mode;

/// Environment variable consulted when `cloud.api_key` is not set.
pub const API_KEY_ENV: &str = "PHISHSCAN_API_KEY";

/// Service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Mode used until the user picks one.
    ///
    /// Default: cloud
    pub default_mode: Mode,

    /// The result cache is cleared once it holds this many entries.
    ///
    /// Default: 100
    pub cache_max_entries: usize,

    /// Page text beyond this many characters is not sent to a backend.
    ///
    /// Default: 20000
    pub max_content_chars: usize,

    /// URL prefix of the extension's own pages, which are never scanned.
    pub extension_origin: String,

    pub cloud: CloudConfig,

    pub local: LocalConfig,
}

/// Remote classifier settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    pub endpoint: String,

    /// API key. Falls back to `PHISHSCAN_API_KEY` when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    pub model: String,

    /// Per-request HTTP timeout. Independent of the 60 second analysis watchdog.
    pub request_timeout_secs: u64,
}

/// On-device inference server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    pub endpoint: String,
    pub model: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_mode: Mode::Cloud,
            cache_max_entries: crate::cache::DEFAULT_MAX_ENTRIES,
            max_content_chars: 20_000,
            extension_origin: "chrome-extension://phishscan/".to_string(),
            cloud: CloudConfig::default(),
            local: LocalConfig::default(),
        }
    }
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.phishscan.dev/v1/analyze".to_string(),
            api_key: None,
            model: "phishscan-cloud-1".to_string(),
            request_timeout_secs: 45,
        }
    }
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "gemma3:1b".to_string(),
        }
    }
}

impl CloudConfig {
    /// The configured key, or the environment fallback. Blank keys count as unset.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|key| !key.trim().is_empty())
    }
}

impl Config {
    /// Loads configuration from the config file, or defaults if it is missing.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        Ok(config)
    }

    /// Saves the configuration, creating the parent directory if needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        crate::platform::config_dir().join("config.toml")
    }

    pub fn generate_default_config() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();

        assert_eq!(config.default_mode, Mode::Cloud);
        assert_eq!(config.cache_max_entries, 100);
        assert_eq!(config.max_content_chars, 20_000);
        assert!(config.cloud.api_key.is_none());
        assert_eq!(config.local.endpoint, "http://localhost:11434");
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            default_mode = "local"

            [local]
            model = "phi3"
            "#,
        )
        .unwrap();

        assert_eq!(config.default_mode, Mode::Local);
        assert_eq!(config.local.model, "phi3");
        assert_eq!(config.local.endpoint, "http://localhost:11434");
        assert_eq!(config.cache_max_entries, 100);
    }

    #[test]
    fn test_save_and_load_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.cache_max_entries = 7;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.cache_max_entries, 7);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(loaded.default_mode, Mode::Cloud);
    }

    #[test]
    fn test_blank_api_key_is_unset() {
        let cloud = CloudConfig {
            api_key: Some("   ".to_string()),
            ..CloudConfig::default()
        };
        // The env fallback is not consulted when a key is configured, even a blank one
        assert!(cloud.resolved_api_key().is_none());

        let cloud = CloudConfig {
            api_key: Some("sk-test".to_string()),
            ..CloudConfig::default()
        };
        assert_eq!(cloud.resolved_api_key().as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_generated_default_parses() {
        let text = Config::generate_default_config();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.extension_origin, "chrome-extension://phishscan/");
    }
}
