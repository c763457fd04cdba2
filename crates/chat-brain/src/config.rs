//! Configuration for ChatBrain.

use brain_core::BrainError;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default generation deadline.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Hosted backend family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// OpenAI chat completions.
    OpenAi,
    /// Anthropic Messages API.
    Anthropic,
    /// Ollama through its OpenAI-compatible endpoint.
    Ollama,
}

impl Provider {
    pub fn default_api_url(&self) -> &'static str {
        match self {
            Provider::OpenAi => "https://api.openai.com",
            Provider::Anthropic => "https://api.anthropic.com",
            Provider::Ollama => "http://localhost:11434",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::OpenAi => "gpt-4o",
            Provider::Anthropic => "claude-sonnet-4-20250514",
            Provider::Ollama => "llama3.1",
        }
    }

    /// Prefix of the provider-specific environment variables.
    fn env_prefix(&self) -> &'static str {
        match self {
            Provider::OpenAi => "OPENAI",
            Provider::Anthropic => "ANTHROPIC",
            Provider::Ollama => "OLLAMA",
        }
    }

    pub fn requires_api_key(&self) -> bool {
        !matches!(self, Provider::Ollama)
    }
}

impl FromStr for Provider {
    type Err = BrainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "anthropic" | "claude" => Ok(Provider::Anthropic),
            "ollama" => Ok(Provider::Ollama),
            other => Err(BrainError::Configuration(format!(
                "unknown AI_PROVIDER '{other}' (expected openai, anthropic or ollama)"
            ))),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Ollama => "ollama",
        })
    }
}

/// Configuration for ChatBrain.
#[derive(Debug, Clone)]
pub struct ChatBrainConfig {
    pub provider: Provider,

    /// Base URL without the API path.
    pub api_url: String,

    /// API key, absent for local Ollama.
    pub api_key: Option<String>,

    /// Model name to use.
    pub model: String,

    /// Maximum tokens for response.
    pub max_tokens: u32,

    /// Temperature for generation.
    pub temperature: Option<f32>,

    /// Per-request deadline.
    pub timeout: Duration,
}

impl Default for ChatBrainConfig {
    fn default() -> Self {
        Self::for_provider(Provider::Anthropic)
    }
}

impl ChatBrainConfig {
    /// Defaults for a provider, without credentials.
    pub fn for_provider(provider: Provider) -> Self {
        Self {
            provider,
            api_url: provider.default_api_url().to_string(),
            api_key: None,
            model: provider.default_model().to_string(),
            max_tokens: 1024,
            temperature: Some(0.7),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Create configuration from environment variables.
    ///
    /// - `AI_PROVIDER` - `openai`, `anthropic` or `ollama` (default: anthropic)
    /// - `OPENAI_API_KEY` / `OPENAI_MODEL` / `OPENAI_API_URL`
    /// - `ANTHROPIC_API_KEY` / `ANTHROPIC_MODEL` / `ANTHROPIC_API_URL`
    /// - `OLLAMA_HOST` / `OLLAMA_MODEL`
    /// - `AI_MAX_TOKENS` - Max tokens (default: 1024)
    /// - `AI_TEMPERATURE` - Temperature (default: 0.7)
    /// - `AI_TIMEOUT_SECS` - Request deadline (default: 60)
    pub fn from_env() -> Result<Self, BrainError> {
        let provider = match env::var("AI_PROVIDER") {
            Ok(value) => value.parse()?,
            Err(_) => Provider::Anthropic,
        };
        let mut config = Self::for_provider(provider);
        let prefix = provider.env_prefix();

        config.api_key = env::var(format!("{prefix}_API_KEY"))
            .ok()
            .filter(|key| !key.trim().is_empty());
        if provider.requires_api_key() && config.api_key.is_none() {
            return Err(BrainError::Configuration(format!("{prefix}_API_KEY not set")));
        }

        let url_var = match provider {
            Provider::Ollama => "OLLAMA_HOST".to_string(),
            _ => format!("{prefix}_API_URL"),
        };
        if let Ok(url) = env::var(url_var) {
            config.api_url = url.trim_end_matches('/').to_string();
        }

        if let Ok(model) = env::var(format!("{prefix}_MODEL")) {
            config.model = model;
        }

        if let Some(tokens) = env::var("AI_MAX_TOKENS").ok().and_then(|v| v.parse().ok()) {
            config.max_tokens = tokens;
        }

        if let Some(temperature) = env::var("AI_TEMPERATURE").ok().and_then(|v| v.parse().ok()) {
            config.temperature = Some(temperature);
        }

        if let Some(secs) = env::var("AI_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
        {
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Create a new config builder.
    pub fn builder(provider: Provider) -> ChatBrainConfigBuilder {
        ChatBrainConfigBuilder {
            config: Self::for_provider(provider),
        }
    }
}

/// Builder for ChatBrainConfig.
#[derive(Debug)]
pub struct ChatBrainConfigBuilder {
    config: ChatBrainConfig,
}

impl ChatBrainConfigBuilder {
    /// Set the API key.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    /// Set the API URL.
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_url = url.into();
        self
    }

    /// Set the model name.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    /// Set the max tokens.
    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.config.max_tokens = tokens;
        self
    }

    /// Set the temperature.
    pub fn temperature(mut self, temp: f32) -> Self {
        self.config.temperature = Some(temp);
        self
    }

    /// Set the request deadline.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ChatBrainConfig {
        self.config
    }
}
