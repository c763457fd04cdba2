//! The Brain trait definition.

use async_trait::async_trait;

use crate::error::BrainError;
use crate::history::HistoryMessage;

/// A reply generator: persona instruction plus ordered turns in, text out.
///
/// Implementations range from canned test doubles to hosted LLM backends.
/// The trait is object-safe and is shared as `Arc<dyn Brain>`.
#[async_trait]
pub trait Brain: Send + Sync {
    /// Generate the next assistant turn.
    ///
    /// `persona` is the system instruction; `messages` are oldest first and
    /// never include a system turn.
    async fn generate(&self, persona: &str, messages: &[HistoryMessage]) -> Result<String, BrainError>;

    /// Get a human-readable name for this generator.
    fn name(&self) -> &str;

    /// Check if the generator is ready to serve requests.
    ///
    /// Default implementation always returns true.
    async fn is_ready(&self) -> bool {
        true
    }
}
