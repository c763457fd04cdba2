//! Delayed brain implementation - wraps another brain with artificial delay.

use std::time::Duration;

use brain_core::{async_trait, Brain, BrainError, HistoryMessage};
use tokio::time::sleep;

/// A brain that wraps another brain and adds artificial delay.
///
/// Useful for testing generator timeouts.
pub struct DelayedBrain<B: Brain> {
    inner: B,
    delay: Duration,
}

impl<B: Brain> DelayedBrain<B> {
    /// Create a new DelayedBrain wrapping the given brain with the specified delay.
    pub fn new(inner: B, delay: Duration) -> Self {
        Self { inner, delay }
    }

    /// Create a brain with a delay in milliseconds.
    pub fn with_millis(inner: B, millis: u64) -> Self {
        Self::new(inner, Duration::from_millis(millis))
    }
}

#[async_trait]
impl<B: Brain> Brain for DelayedBrain<B> {
    async fn generate(&self, persona: &str, messages: &[HistoryMessage]) -> Result<String, BrainError> {
        sleep(self.delay).await;
        self.inner.generate(persona, messages).await
    }

    fn name(&self) -> &str {
        "DelayedBrain"
    }

    async fn is_ready(&self) -> bool {
        self.inner.is_ready().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EchoBrain;
    use std::time::Instant;

    #[tokio::test]
    async fn waits_before_answering() {
        let brain = DelayedBrain::with_millis(EchoBrain::new(), 100);

        let start = Instant::now();
        let reply = brain
            .generate("", &[HistoryMessage::user("test")])
            .await
            .unwrap();

        assert_eq!(reply, "test");
        assert!(start.elapsed() >= Duration::from_millis(100));
        assert_eq!(brain.name(), "DelayedBrain");
    }
}
