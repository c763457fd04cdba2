//! Conversation memory: the rolling window of turns plus one long-term
//! summary per user.

use std::sync::Arc;
use std::time::Duration;

use billing::Clock;
use brain_core::{Brain, BrainError, HistoryMessage};
use database::{chat_summary, message, Database, Message, MessageRole};
use tracing::{debug, info, warn};

use crate::config::MemorySettings;
use crate::context::{build_context, summary_request, SUMMARIZER_PERSONA};
use crate::error::Result;

/// Durable conversation memory backed by SQLite.
#[derive(Clone)]
pub struct ConversationMemory {
    db: Database,
    brain: Arc<dyn Brain>,
    clock: Arc<dyn Clock>,
    settings: MemorySettings,
    timeout: Duration,
}

impl ConversationMemory {
    pub fn new(
        db: Database,
        brain: Arc<dyn Brain>,
        clock: Arc<dyn Clock>,
        settings: MemorySettings,
        timeout: Duration,
    ) -> Self {
        Self {
            db,
            brain,
            clock,
            settings,
            timeout,
        }
    }

    pub fn settings(&self) -> &MemorySettings {
        &self.settings
    }

    pub async fn append(&self, user_id: i64, role: MessageRole, text: &str) -> Result<i64> {
        Ok(message::append_message(self.db.pool(), user_id, role, text, self.clock.now()).await?)
    }

    /// Last `limit` turns, oldest first.
    pub async fn get_recent(&self, user_id: i64, limit: usize) -> Result<Vec<Message>> {
        Ok(message::recent_messages(self.db.pool(), user_id, limit).await?)
    }

    pub async fn count(&self, user_id: i64) -> Result<i64> {
        Ok(message::count_messages(self.db.pool(), user_id).await?)
    }

    /// Turns older than the newest `keep`, oldest first.
    pub async fn get_overflow(&self, user_id: i64, keep: usize) -> Result<Vec<Message>> {
        Ok(message::overflow_messages(self.db.pool(), user_id, keep).await?)
    }

    /// Delete all but the newest `keep` turns. Returns how many went.
    pub async fn trim(&self, user_id: i64, keep: usize) -> Result<u64> {
        Ok(message::trim_messages(self.db.pool(), user_id, keep).await?)
    }

    /// Delete every turn. The summary stays.
    pub async fn clear(&self, user_id: i64) -> Result<u64> {
        Ok(message::clear_messages(self.db.pool(), user_id).await?)
    }

    pub async fn summary(&self, user_id: i64) -> Result<Option<String>> {
        Ok(chat_summary::get_summary(self.db.pool(), user_id)
            .await?
            .map(|row| row.summary))
    }

    /// Generator input for the next reply: memory turn plus the active window.
    pub async fn build_context(&self, user_id: i64) -> Result<Vec<HistoryMessage>> {
        let summary = self.summary(user_id).await?;
        let recent = self.get_recent(user_id, self.settings.max_history).await?;
        Ok(build_context(summary.as_deref(), &recent))
    }

    /// Fold turns that left the window into the summary once the history
    /// grows past the threshold. Returns whether a summary was written.
    ///
    /// On any failure the history is left as it was.
    pub async fn maybe_summarize(&self, user_id: i64) -> Result<bool> {
        let count = self.count(user_id).await?;
        if count <= self.settings.summary_threshold() as i64 {
            return Ok(false);
        }

        let overflow = self.get_overflow(user_id, self.settings.max_history).await?;
        if overflow.len() < self.settings.min_overflow {
            debug!(user_id, overflow = overflow.len(), "Too little overflow to summarize");
            return Ok(false);
        }

        let summary = self.merge_summary(user_id, &overflow).await?;

        // Turns appended while the generator ran were never summarized.
        // Only the summarized ones may go.
        let last_id = overflow.last().map(|m| m.id).unwrap_or_default();
        let mut tx = self.db.begin_write().await?;
        chat_summary::upsert_summary(&mut *tx, user_id, &summary, overflow.len() as i64, self.clock.now()).await?;
        let trimmed = message::delete_through(&mut *tx, user_id, last_id).await?;
        tx.commit().await.map_err(database::DatabaseError::from)?;

        info!(user_id, summarized = overflow.len(), trimmed, "Conversation summarized");
        Ok(true)
    }

    /// Summarize the whole history (when there is enough of it), then clear it.
    /// Summarization here is best-effort; the history is cleared regardless.
    pub async fn reset_with_summary(&self, user_id: i64) -> Result<u64> {
        let history = message::all_messages(self.db.pool(), user_id).await?;

        if history.len() >= self.settings.min_overflow {
            match self.merge_summary(user_id, &history).await {
                Ok(summary) => {
                    chat_summary::upsert_summary(
                        self.db.pool(),
                        user_id,
                        &summary,
                        history.len() as i64,
                        self.clock.now(),
                    )
                    .await?;
                }
                Err(e) => warn!(user_id, error = %e, "Summary before reset failed"),
            }
        }

        let deleted = self.clear(user_id).await?;
        info!(user_id, deleted, "Conversation reset");
        Ok(deleted)
    }

    async fn merge_summary(&self, user_id: i64, turns: &[Message]) -> Result<String> {
        let existing = self.summary(user_id).await?;
        let request = summary_request(
            existing.as_deref(),
            turns,
            self.settings.max_summary_sentences,
        );

        let generated = tokio::time::timeout(
            self.timeout,
            self.brain.generate(SUMMARIZER_PERSONA, &[HistoryMessage::user(request)]),
        )
        .await
        .map_err(|_| BrainError::Timeout)??;

        let summary = generated.trim();
        if summary.is_empty() {
            return Err(BrainError::ProcessingFailed("empty summary".to_string()).into());
        }
        Ok(summary.to_string())
    }
}
