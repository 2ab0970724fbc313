//! Environment-driven relay configuration.

use std::str::FromStr;

use crate::error::{RelayError, Result};

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_MODEL: &str = "openai/gpt-4o";
const DEFAULT_TEMPERATURE: f64 = 0.7;
const DEFAULT_MAX_TOKENS: u32 = 1024;
const DEFAULT_PENALTY: f64 = 0.5;
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_BIND: &str = "0.0.0.0:3001";

/// Relay configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Upstream API key (Bearer token).
    pub api_key: String,
    /// Base URL of the chat-completions API.
    pub base_url: String,
    /// `HTTP-Referer` header sent upstream.
    pub referer: String,
    /// `X-Title` header sent upstream.
    pub title: String,
    /// Model used when the caller does not name one.
    pub default_model: String,
    /// Sampling temperature used when the caller does not set one.
    pub default_temperature: f64,
    pub max_tokens: u32,
    pub frequency_penalty: f64,
    pub presence_penalty: f64,
    /// Timeout applied to each upstream request.
    pub timeout_secs: u64,
    /// Address the HTTP server binds to.
    pub bind_addr: String,
}

impl RelayConfig {
    /// Create a config with defaults for everything but the API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            referer: "https://stride.app".to_string(),
            title: "Stride Coach".to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            default_temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            frequency_penalty: DEFAULT_PENALTY,
            presence_penalty: DEFAULT_PENALTY,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            bind_addr: DEFAULT_BIND.to_string(),
        }
    }

    /// Load from environment variables, honoring a `.env` file if present.
    ///
    /// `OPENROUTER_API_KEY` is required; everything else falls back to
    /// defaults.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error

        let api_key = std::env::var("OPENROUTER_API_KEY").map_err(|_| {
            RelayError::Configuration("OPENROUTER_API_KEY is not set".to_string())
        })?;

        let mut config = Self::new(api_key);
        if let Ok(url) = std::env::var("OPENROUTER_BASE_URL") {
            config.base_url = url;
        }
        if let Ok(referer) = std::env::var("RELAY_REFERER") {
            config.referer = referer;
        }
        if let Ok(title) = std::env::var("RELAY_TITLE") {
            config.title = title;
        }
        if let Ok(model) = std::env::var("RELAY_MODEL") {
            config.default_model = model;
        }
        config.default_temperature = env_parse("RELAY_TEMPERATURE", config.default_temperature);
        config.max_tokens = env_parse("RELAY_MAX_TOKENS", config.max_tokens);
        config.frequency_penalty = env_parse("RELAY_FREQUENCY_PENALTY", config.frequency_penalty);
        config.presence_penalty = env_parse("RELAY_PRESENCE_PENALTY", config.presence_penalty);
        config.timeout_secs = env_parse("RELAY_TIMEOUT_SECS", config.timeout_secs);
        if let Ok(bind) = std::env::var("RELAY_BIND") {
            config.bind_addr = bind;
        }
        Ok(config)
    }

    /// Override the upstream base URL (used by tests against a mock server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the default model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }
}

fn env_parse<T: FromStr + Copy>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
