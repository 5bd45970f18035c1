//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! the API base URL, the storage tier used for the user cache, and the
//! HTTP request timeout.
//!
//! Configuration is stored at `~/.config/userdir/config.json`. The
//! `USERDIR_API_URL` and `USERDIR_STORAGE` environment variables override
//! the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::{DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::cache::StorageTier;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "userdir";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Subdirectory of the cache dir holding store files
const STORE_DIR: &str = "store";

pub const ENV_API_URL: &str = "USERDIR_API_URL";
pub const ENV_STORAGE: &str = "USERDIR_STORAGE";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub storage: StorageTier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Read `path`, falling back to defaults when it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply `USERDIR_*` overrides read through `lookup`.
    /// Unparseable values are logged and ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_API_URL).filter(|u| !u.trim().is_empty()) {
            self.api_base_url = Some(url.trim().to_string());
        }

        if let Some(value) = lookup(ENV_STORAGE) {
            match value.parse() {
                Ok(tier) => self.storage = tier,
                Err(e) => warn!(error = %e, "Ignoring {}", ENV_STORAGE),
            }
        }
    }

    /// Load the file and apply the process environment on top
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn api_base_url(&self) -> &str {
        self.api_base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    /// Where `load` reads and `save` writes
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Directory used by the file storage tier
    pub fn store_dir(&self) -> Result<PathBuf> {
        Ok(self.cache_dir()?.join(STORE_DIR))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api_base_url(), DEFAULT_BASE_URL);
        assert_eq!(config.storage, StorageTier::File);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_parse_partial_file() {
        let config: Config = serde_json::from_str(r#"{"storage":"memory"}"#).unwrap();
        assert_eq!(config.storage, StorageTier::Memory);
        assert_eq!(config.api_base_url, None);

        let config: Config =
            serde_json::from_str(r#"{"api_base_url":"http://localhost:3000","request_timeout_secs":5}"#)
                .unwrap();
        assert_eq!(config.api_base_url(), "http://localhost:3000");
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_apply_env_overrides() {
        let mut config = Config::default();
        config.apply_env(|key| match key {
            ENV_API_URL => Some(" http://mock.local ".to_string()),
            ENV_STORAGE => Some("none".to_string()),
            _ => None,
        });
        assert_eq!(config.api_base_url(), "http://mock.local");
        assert_eq!(config.storage, StorageTier::None);
    }

    #[test]
    fn test_apply_env_ignores_bad_values() {
        let mut config = Config {
            storage: StorageTier::Memory,
            ..Default::default()
        };
        config.apply_env(|key| match key {
            ENV_API_URL => Some("   ".to_string()),
            ENV_STORAGE => Some("redis".to_string()),
            _ => None,
        });
        assert_eq!(config.api_base_url, None);
        assert_eq!(config.storage, StorageTier::Memory);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(APP_NAME).join(CONFIG_FILE);
        assert_eq!(Config::load_from(&path).unwrap(), Config::default());

        let config = Config {
            api_base_url: Some("http://localhost:3000".to_string()),
            storage: StorageTier::Memory,
            request_timeout_secs: Some(5),
        };
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }
}
