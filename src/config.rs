//! Console connection settings.
//!
//! Loaded from a TOML file or from `WORKERVET_*` environment variables and
//! validated before use.
//!
//! ```toml
//! base_url = "https://api.workervet.example/api/v1"
//! bearer_token = "..."
//! request_timeout_ms = 10000
//! debounce_ms = 300
//! page_limit = 20
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::debounce::DEFAULT_DEBOUNCE;

pub const ENV_BASE_URL: &str = "WORKERVET_BASE_URL";
pub const ENV_TOKEN: &str = "WORKERVET_TOKEN";
pub const ENV_TIMEOUT_MS: &str = "WORKERVET_TIMEOUT_MS";
pub const ENV_DEBOUNCE_MS: &str = "WORKERVET_DEBOUNCE_MS";

const DEFAULT_PAGE_LIMIT: u32 = 20;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("base URL is not set (use a config file or {ENV_BASE_URL})")]
    MissingBaseUrl,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("toml parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error("http client: {0}")]
    Client(String),
}

/// Where the API lives and how the console talks to it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiConfig {
    /// Absolute http(s) URL every request path is joined onto.
    pub base_url: String,
    /// Sent as `Authorization: Bearer` on authenticated requests.
    #[serde(default)]
    pub bearer_token: Option<String>,
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE.as_millis() as u64
}

const fn default_page_limit() -> u32 {
    DEFAULT_PAGE_LIMIT
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            bearer_token: None,
            request_timeout_ms: None,
            debounce_ms: default_debounce_ms(),
            page_limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl ApiConfig {
    /// Reads and validates a TOML config file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads the `WORKERVET_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env) with a caller-supplied lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = lookup(ENV_BASE_URL)
            .filter(|value| !value.trim().is_empty())
            .ok_or(ConfigError::MissingBaseUrl)?;

        let mut config = Self {
            base_url,
            bearer_token: lookup(ENV_TOKEN).filter(|value| !value.is_empty()),
            ..Self::default()
        };
        if let Some(raw) = lookup(ENV_TIMEOUT_MS) {
            config.request_timeout_ms = Some(parse_millis("request_timeout_ms", &raw)?);
        }
        if let Some(raw) = lookup(ENV_DEBOUNCE_MS) {
            config.debounce_ms = parse_millis("debounce_ms", &raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let base_url = self.base_url.trim();
        if base_url.is_empty() {
            return Err(ConfigError::MissingBaseUrl);
        }
        let Some((scheme, rest)) = base_url.split_once("://") else {
            return Err(ConfigError::InvalidValue {
                field: "base_url",
                reason: format!("'{base_url}' is not an absolute URL"),
            });
        };
        if !matches!(scheme, "http" | "https") {
            return Err(ConfigError::InvalidValue {
                field: "base_url",
                reason: format!("unsupported scheme '{scheme}'"),
            });
        }
        if rest.trim_start_matches('/').is_empty() || rest.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                field: "base_url",
                reason: "missing host".to_string(),
            });
        }

        if self.request_timeout_ms == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.debounce_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "debounce_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.page_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "page_limit",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    #[must_use]
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

fn parse_millis(field: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|err| ConfigError::InvalidValue {
        field,
        reason: format!("'{raw}': {err}"),
    })
}
