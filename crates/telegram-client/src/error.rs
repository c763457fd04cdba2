//! Error types for the Bot API client.

use thiserror::Error;

/// Errors that can occur when calling the Bot API.
#[derive(Debug, Error)]
pub enum TelegramError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Bot API answered `ok: false`.
    #[error("Bot API error {code}: {description}")]
    Api { code: i32, description: String },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl TelegramError {
    /// The user blocked the bot or deleted the chat; retrying will not help.
    pub fn is_unreachable_chat(&self) -> bool {
        matches!(self, TelegramError::Api { code: 403, .. })
    }
}
