//! Client configuration
//!
//! Values come from a TOML file, then `FEDORA_*` environment variables,
//! then whatever the caller sets explicitly.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const ENV_URL: &str = "FEDORA_URL";
pub const ENV_USER: &str = "FEDORA_USER";
pub const ENV_PASSWORD: &str = "FEDORA_PASSWORD";
pub const ENV_TIMEOUT: &str = "FEDORA_TIMEOUT_SECS";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid repository URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Invalid timeout '{0}', expected a number of seconds")]
    InvalidTimeout(String),
}

/// Connection settings for a Fedora repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the REST API, e.g. `http://localhost:8080/fedora`
    pub url: String,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080/fedora".to_string(),
            user: None,
            password: None,
            timeout_secs: 300,
        }
    }
}

impl ClientConfig {
    /// Load from a TOML file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read client config from {:?}", path))?;
        Self::from_toml_str(&data)
            .with_context(|| format!("Failed to parse client config {:?}", path))
    }

    pub fn from_toml_str(data: &str) -> Result<Self> {
        let config: ClientConfig = toml::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `FEDORA_*` overrides from the process environment
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    /// Apply `FEDORA_*` overrides from an arbitrary lookup
    pub fn with_env_from<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_URL) {
            self.url = url;
        }
        if let Some(user) = lookup(ENV_USER) {
            self.user = Some(user);
        }
        if let Some(password) = lookup(ENV_PASSWORD) {
            self.password = Some(password);
        }
        if let Some(timeout) = lookup(ENV_TIMEOUT) {
            self.timeout_secs = timeout
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidTimeout(timeout.clone()))?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Base URL with a trailing slash, ready for joining relative paths
    pub fn base_url(&self) -> Result<reqwest::Url, ConfigError> {
        let mut raw = self.url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let url = reqwest::Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl {
            url: self.url.clone(),
            message: e.to_string(),
        })?;
        if url.cannot_be_a_base() {
            return Err(ConfigError::InvalidUrl {
                url: self.url.clone(),
                message: "not a base URL".to_string(),
            });
        }
        Ok(url)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.base_url().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.url, "http://localhost:8080/fedora");
        assert_eq!(config.timeout_secs, 300);
        assert!(config.user.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ClientConfig::from_toml_str("user = \"fedoraAdmin\"\n").unwrap();
        assert_eq!(config.user.as_deref(), Some("fedoraAdmin"));
        assert_eq!(config.url, "http://localhost:8080/fedora");
    }

    #[test]
    fn test_env_overrides_file_values() {
        let config = ClientConfig::from_toml_str("url = \"http://a/fedora\"\ntimeout_secs = 5\n")
            .unwrap()
            .with_env_from(|key| match key {
                ENV_URL => Some("http://b:8080/fedora".to_string()),
                ENV_PASSWORD => Some("secret".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.url, "http://b:8080/fedora");
        assert_eq!(config.password.as_deref(), Some("secret"));
        assert_eq!(config.timeout_secs, 5);
    }

    #[test]
    fn test_bad_timeout_is_rejected() {
        let err = ClientConfig::default()
            .with_env_from(|key| (key == ENV_TIMEOUT).then(|| "soon".to_string()))
            .unwrap_err();
        assert_eq!(err, ConfigError::InvalidTimeout("soon".to_string()));
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let config = ClientConfig::default();
        let base = config.base_url().unwrap();
        assert_eq!(base.as_str(), "http://localhost:8080/fedora/");
        assert_eq!(
            base.join("objects/test:1").unwrap().as_str(),
            "http://localhost:8080/fedora/objects/test:1"
        );
    }

    #[test]
    fn test_invalid_url() {
        assert!(ClientConfig::from_toml_str("url = \"not a url\"\n").is_err());
    }
}
