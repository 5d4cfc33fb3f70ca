//! Tag store client configuration.

use std::time::Duration;

use affinity_core::defaults;
use affinity_core::{Error, Result};

/// Configuration for [`HttpTagStore`](crate::HttpTagStore).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base `user_results` URL; endpoint paths are appended to it.
    pub base_url: String,
    /// Bearer token sent with every request (optional).
    pub api_token: Option<String>,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::API_URL.to_string(),
            api_token: None,
            timeout_seconds: defaults::REQUEST_TIMEOUT_SECS,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Read `AFFINITY_API_URL`, `AFFINITY_API_TOKEN`, `AFFINITY_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var(defaults::ENV_API_URL)
            .unwrap_or_else(|_| defaults::API_URL.to_string());
        let api_token = std::env::var(defaults::ENV_API_TOKEN)
            .ok()
            .filter(|t| !t.is_empty());
        let timeout_seconds = match std::env::var(defaults::ENV_TIMEOUT_SECS) {
            Ok(raw) => raw.parse().map_err(|_| {
                Error::Config(format!(
                    "{} must be a number of seconds, got {:?}",
                    defaults::ENV_TIMEOUT_SECS,
                    raw
                ))
            })?,
            Err(_) => defaults::REQUEST_TIMEOUT_SECS,
        };

        let config = Self {
            base_url,
            api_token,
            timeout_seconds,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    pub fn with_timeout_seconds(mut self, secs: u64) -> Self {
        self.timeout_seconds = secs;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "API url must start with http:// or https://, got {:?}",
                self.base_url
            )));
        }
        if self.timeout_seconds == 0 {
            return Err(Error::Config("timeout must be at least one second".to_string()));
        }
        Ok(())
    }

    /// Full URL of an endpoint such as `"toggle_tag/"`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}
