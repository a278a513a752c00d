//! Application configuration management.
//!
//! Configuration is stored at `<config_dir>/alisto/config.json` and holds the
//! API base URL, the last email used to sign in, an optional data directory
//! override and the request timeout.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::client::{DEFAULT_API_BASE_URL, REQUEST_TIMEOUT_SECS};

/// Application name used for config/data directory paths
pub const APP_NAME: &str = "alisto";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable that overrides the configured API base URL.
pub const API_URL_ENV: &str = "ALISTO_API_URL";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    pub api_base_url: Option<String>,
    pub last_email: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub request_timeout_secs: Option<u64>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Base URL in effect: environment, then config file, then the default.
    pub fn api_base_url(&self) -> String {
        Self::pick_api_url(std::env::var(API_URL_ENV).ok(), self.api_base_url.as_deref())
    }

    fn pick_api_url(env: Option<String>, configured: Option<&str>) -> String {
        env.filter(|v| !v.trim().is_empty())
            .or_else(|| configured.map(str::to_string))
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(REQUEST_TIMEOUT_SECS))
    }

    /// Directory holding the key-value store files.
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    pub fn store_dir(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("store"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.request_timeout(), Duration::from_secs(REQUEST_TIMEOUT_SECS));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alisto").join(CONFIG_FILE);
        let config = Config {
            api_base_url: Some("https://city.example/api".to_string()),
            last_email: Some("juan@example.com".to_string()),
            data_dir: Some(dir.path().join("data")),
            request_timeout_secs: Some(10),
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.store_dir().unwrap(), dir.path().join("data").join("store"));
    }

    #[test]
    fn test_api_url_precedence() {
        assert_eq!(Config::pick_api_url(None, None), DEFAULT_API_BASE_URL);
        assert_eq!(
            Config::pick_api_url(None, Some("https://a.example/api")),
            "https://a.example/api"
        );
        assert_eq!(
            Config::pick_api_url(Some("https://b.example/api".into()), Some("https://a.example/api")),
            "https://b.example/api"
        );
        assert_eq!(
            Config::pick_api_url(Some("  ".into()), Some("https://a.example/api")),
            "https://a.example/api"
        );
    }
}
