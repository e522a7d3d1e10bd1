use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Result, anyhow};

use crate::api::DEFAULT_API_URL;
use crate::poll::{PollConfig, DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL};

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Persisted user settings. Every field is optional; environment variables and
/// CLI flags take precedence, and unset fields fall back to built-in defaults.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<u64>,
    /// `0` disables the attempt ceiling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_poll_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)
            .map_err(|e| anyhow!("Invalid config file {}: {}", path.display(), e))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    /// Overlay `FLIGHTCHAT_*` environment variables onto this config.
    pub fn with_env(self) -> Self {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    fn with_env_from(self, var: impl Fn(&str) -> Option<String>) -> Self {
        let env = Config {
            api_url: var("FLIGHTCHAT_API_URL").filter(|url| !url.is_empty()),
            poll_interval_ms: var("FLIGHTCHAT_POLL_INTERVAL_MS").and_then(|v| v.parse().ok()),
            max_poll_attempts: var("FLIGHTCHAT_MAX_POLL_ATTEMPTS").and_then(|v| v.parse().ok()),
            request_timeout_secs: None,
        };
        self.merge(env)
    }

    /// Overlay the set fields of `other` onto `self`.
    pub fn merge(mut self, other: Config) -> Self {
        self.api_url = other.api_url.or(self.api_url);
        self.poll_interval_ms = other.poll_interval_ms.or(self.poll_interval_ms);
        self.max_poll_attempts = other.max_poll_attempts.or(self.max_poll_attempts);
        self.request_timeout_secs = other.request_timeout_secs.or(self.request_timeout_secs);
        self
    }

    pub fn api_url(&self) -> &str {
        self.api_url.as_deref().unwrap_or(DEFAULT_API_URL)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    pub fn poll_config(&self) -> PollConfig {
        let interval = self
            .poll_interval_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_POLL_INTERVAL);
        let max_attempts = match self.max_poll_attempts {
            Some(0) => None,
            Some(n) => Some(n),
            None => Some(DEFAULT_MAX_ATTEMPTS),
        };
        PollConfig {
            interval,
            max_attempts,
        }
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("flightchat").join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = Config::new();
        assert_eq!(config.api_url(), "http://localhost:8000");
        assert_eq!(config.poll_config(), PollConfig::default());
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::new());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            api_url: Some("http://analysis:9000".to_string()),
            poll_interval_ms: Some(500),
            max_poll_attempts: Some(0),
            request_timeout_secs: None,
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(
            loaded.poll_config(),
            PollConfig {
                interval: Duration::from_millis(500),
                max_attempts: None,
            }
        );
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_precedence() {
        let file = Config {
            api_url: Some("http://from-file".to_string()),
            poll_interval_ms: None,
            max_poll_attempts: Some(10),
            request_timeout_secs: None,
        };
        let env = |key: &str| match key {
            "FLIGHTCHAT_API_URL" => Some("http://from-env".to_string()),
            "FLIGHTCHAT_POLL_INTERVAL_MS" => Some("250".to_string()),
            "FLIGHTCHAT_MAX_POLL_ATTEMPTS" => Some("not a number".to_string()),
            _ => None,
        };
        let flags = Config {
            max_poll_attempts: Some(3),
            ..Config::new()
        };

        let effective = file.clone().with_env_from(env).merge(flags);
        assert_eq!(effective.api_url(), "http://from-env");
        assert_eq!(effective.poll_interval_ms, Some(250));
        assert_eq!(effective.max_poll_attempts, Some(3));

        // An unparseable variable leaves the file value in place
        let effective = file.with_env_from(env);
        assert_eq!(effective.max_poll_attempts, Some(10));
    }
}
