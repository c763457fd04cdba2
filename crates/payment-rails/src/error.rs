//! Error types for payment rails.

use thiserror::Error;

/// Errors that can occur when talking to a payment rail.
#[derive(Debug, Error)]
pub enum RailError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The remote API answered with an error.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl RailError {
    /// Whether the next poll may succeed where this one failed.
    pub fn is_transient(&self) -> bool {
        match self {
            RailError::Http(_) => true,
            RailError::Api { status, .. } => *status == 429 || *status >= 500,
            RailError::Json(_) | RailError::Config(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        let throttled = RailError::Api {
            status: 429,
            message: "rate limit".into(),
        };
        let rejected = RailError::Api {
            status: 400,
            message: "bad payee".into(),
        };
        assert!(throttled.is_transient());
        assert!(!rejected.is_transient());
        assert!(!RailError::Config("missing".into()).is_transient());
    }
}
