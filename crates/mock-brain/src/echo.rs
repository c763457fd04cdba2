//! Echo brain implementation - repeats the last user turn.

use brain_core::{async_trait, Brain, BrainError, HistoryMessage};

/// A brain that echoes the most recent user turn.
///
/// Useful for exercising the chat pipeline without any backend.
#[derive(Debug, Clone, Default)]
pub struct EchoBrain {
    /// Optional prefix to add before the echo.
    prefix: Option<String>,
}

impl EchoBrain {
    /// Create a new EchoBrain with no prefix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new EchoBrain with a custom prefix.
    ///
    /// ```rust
    /// use mock_brain::EchoBrain;
    ///
    /// let brain = EchoBrain::with_prefix("Echo: ");
    /// // Will respond with "Echo: <last user turn>"
    /// ```
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }
}

#[async_trait]
impl Brain for EchoBrain {
    async fn generate(&self, _persona: &str, messages: &[HistoryMessage]) -> Result<String, BrainError> {
        let last = messages
            .iter()
            .rev()
            .find(|m| m.is_user())
            .map(|m| m.content.as_str())
            .unwrap_or_default();

        Ok(match &self.prefix {
            Some(prefix) => format!("{prefix}{last}"),
            None => last.to_string(),
        })
    }

    fn name(&self) -> &str {
        "EchoBrain"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echoes_last_user_turn() {
        let brain = EchoBrain::new();
        let messages = vec![
            HistoryMessage::user("first"),
            HistoryMessage::assistant("reply"),
            HistoryMessage::user("second"),
            HistoryMessage::assistant("another"),
        ];
        assert_eq!(brain.generate("", &messages).await.unwrap(), "second");
    }

    #[tokio::test]
    async fn prefix_and_empty_history() {
        let brain = EchoBrain::with_prefix("Echo: ");
        assert_eq!(
            brain.generate("", &[HistoryMessage::user("hi")]).await.unwrap(),
            "Echo: hi"
        );
        assert_eq!(brain.generate("", &[]).await.unwrap(), "Echo: ");
        assert_eq!(brain.name(), "EchoBrain");
    }
}
