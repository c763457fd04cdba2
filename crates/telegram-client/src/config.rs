//! Configuration for the Bot API client.

use std::time::Duration;

/// Configuration for talking to the Bot API.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// API base URL (e.g., "https://api.telegram.org").
    pub base_url: String,
    /// Bot token from BotFather.
    pub token: String,
    /// Provider token for card invoices; Stars invoices do not need one.
    pub provider_token: Option<String>,
    pub timeout: Duration,
}

impl BotConfig {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.telegram.org";

    /// Create a new configuration with the given bot token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            token: token.into(),
            provider_token: None,
            timeout: Duration::from_secs(30),
        }
    }

    /// Use a different API server (local Bot API server, test double).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Enable card invoices with a payment provider token.
    pub fn with_provider_token(mut self, token: impl Into<String>) -> Self {
        self.provider_token = Some(token.into()).filter(|t: &String| !t.is_empty());
        self
    }

    /// Get the endpoint URL of a Bot API method.
    pub fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    /// Whether card invoices can be issued.
    pub fn card_payments_enabled(&self) -> bool {
        self.provider_token.is_some()
    }
}
