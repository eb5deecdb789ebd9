//! Application configuration management.
//!
//! This module handles loading the application configuration,
//! which names the origin serving the digest and the application shell.
//!
//! Configuration is stored at `~/.config/langsam/config.json`. The
//! `LANGSAM_BASE_URL` and `LANGSAM_CONTENT_PATH` environment variables
//! take precedence over the file.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "langsam";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Preferences file name (difficulty level and playback speed)
const PREFERENCES_FILE: &str = "preferences.json";

/// Origin used when neither the environment nor the config file names one.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/";

/// Location of the digest document relative to the origin.
pub const DEFAULT_CONTENT_PATH: &str = "content/latest.json";

/// HTTP request timeout in seconds.
/// Long enough for a slow mobile link, short enough that the loading view never hangs.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const BASE_URL_ENV: &str = "LANGSAM_BASE_URL";
const CONTENT_PATH_ENV: &str = "LANGSAM_CONTENT_PATH";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub base_url: Option<String>,
    pub content_path: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME))
    }

    fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE))
    }

    pub fn preferences_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(PREFERENCES_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn base_url(&self) -> String {
        std::env::var(BASE_URL_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .or_else(|| self.base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    pub fn content_path(&self) -> String {
        std::env::var(CONTENT_PATH_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .or_else(|| self.content_path.clone())
            .unwrap_or_else(|| DEFAULT_CONTENT_PATH.to_string())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }
}
