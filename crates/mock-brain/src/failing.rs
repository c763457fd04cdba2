//! Failing brain - every call errors.

use brain_core::{async_trait, Brain, BrainError, HistoryMessage};

/// Which error a [`FailingBrain`] returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Network,
    Processing,
    Timeout,
}

/// A brain whose backend is permanently broken.
#[derive(Debug, Clone)]
pub struct FailingBrain {
    kind: FailureKind,
}

impl FailingBrain {
    pub fn network() -> Self {
        Self {
            kind: FailureKind::Network,
        }
    }

    pub fn processing() -> Self {
        Self {
            kind: FailureKind::Processing,
        }
    }

    pub fn timeout() -> Self {
        Self {
            kind: FailureKind::Timeout,
        }
    }
}

#[async_trait]
impl Brain for FailingBrain {
    async fn generate(&self, _persona: &str, _messages: &[HistoryMessage]) -> Result<String, BrainError> {
        Err(match self.kind {
            FailureKind::Network => BrainError::Network("connection refused".to_string()),
            FailureKind::Processing => BrainError::ProcessingFailed("malformed response".to_string()),
            FailureKind::Timeout => BrainError::Timeout,
        })
    }

    fn name(&self) -> &str {
        "FailingBrain"
    }

    async fn is_ready(&self) -> bool {
        false
    }
}
