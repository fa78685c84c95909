//! Static endpoint configuration.
//!
//! [`AppConfig`] is read once at start-up and shared read-only by every
//! session. Values come from environment variables; binaries may override
//! individual fields from command-line flags.

use std::time::Duration;

use crate::error::ConfigError;
use crate::{DEFAULT_MODEL, DEFAULT_TIMEOUT_SECS, GEMINI_API_BASE};

pub const ENV_API_KEY: &str = "GEMINI_API_KEY";
pub const ENV_MODEL: &str = "GEMINI_MODEL";
pub const ENV_API_BASE: &str = "GEMINI_API_BASE";
pub const ENV_TIMEOUT_SECS: &str = "PROMPTSMITH_TIMEOUT_SECS";

/// Endpoint, model, and credential for the generation client.
#[derive(Clone)]
pub struct AppConfig {
    /// Access credential. Required.
    pub api_key: String,
    /// Model identifier. Default: `"gemini-2.0-flash"`.
    pub model: String,
    /// API base URL. Default: the public Generative Language endpoint.
    pub api_base: String,
    /// Per-request timeout in seconds. Default: `120`.
    pub request_timeout_secs: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl AppConfig {
    /// Config with defaults for everything but the credential.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            api_base: GEMINI_API_BASE.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, which maps a variable name to
    /// its value. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = get(ENV_API_KEY).ok_or(ConfigError::MissingApiKey)?;
        let mut config = Self::new(api_key);

        if let Some(model) = get(ENV_MODEL) {
            config.model = model;
        }
        if let Some(base) = get(ENV_API_BASE) {
            config.api_base = base;
        }
        if let Some(raw) = get(ENV_TIMEOUT_SECS) {
            config.request_timeout_secs = match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => return Err(ConfigError::InvalidTimeout(raw)),
            };
        }
        Ok(config)
    }

    /// Override the model (e.g. from a `--model` flag).
    pub fn with_model(mut self, model: Option<String>) -> Self {
        if let Some(model) = model {
            self.model = model;
        }
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
