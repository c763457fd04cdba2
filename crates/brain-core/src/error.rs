//! Error types for generator backends.

use thiserror::Error;

/// Errors that can occur while generating a reply.
#[derive(Debug, Error)]
pub enum BrainError {
    /// Missing or invalid configuration (API key, model, URL).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The backend could not be reached.
    #[error("network error: {0}")]
    Network(String),

    /// The backend answered with an error or an unusable body.
    #[error("processing failed: {0}")]
    ProcessingFailed(String),

    /// The backend is temporarily unavailable (rate limited, overloaded).
    #[error("brain unavailable: {0}")]
    Unavailable(String),

    /// The call did not finish within its deadline.
    #[error("generation timed out")]
    Timeout,
}

impl BrainError {
    /// Whether retrying later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BrainError::Network(_) | BrainError::Unavailable(_) | BrainError::Timeout
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(BrainError::Timeout.is_transient());
        assert!(BrainError::Network("reset".into()).is_transient());
        assert!(!BrainError::Configuration("no key".into()).is_transient());
        assert!(!BrainError::ProcessingFailed("bad json".into()).is_transient());
    }
}
