//! The chat turn pipeline.

use std::sync::Arc;
use std::time::Duration;

use billing::{Admission, Clock, EntitlementService};
use brain_core::{Brain, BrainError};
use database::{user, Database, MessageRole, UserProfile};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::OrchestratorConfig;
use crate::error::{OrchestratorError, Result};
use crate::memory::ConversationMemory;
use crate::persona::Persona;

/// An inbound chat message as the transport hands it over.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub user_id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub language_code: Option<String>,
    pub text: String,
}

impl InboundMessage {
    pub fn new(user_id: i64, text: impl Into<String>) -> Self {
        Self {
            user_id,
            username: None,
            first_name: None,
            language_code: None,
            text: text.into(),
        }
    }

    fn profile(&self) -> UserProfile {
        UserProfile {
            user_id: self.user_id,
            username: self.username.clone(),
            first_name: self.first_name.clone(),
            language_code: self.language_code.clone(),
        }
    }
}

/// What the transport should tell the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reply {
    /// Generated answer. `free_remaining` is set on free-tier turns.
    Answer {
        text: String,
        free_remaining: Option<i64>,
    },
    /// Daily free limit reached; the message was not processed.
    LimitReached { limit: i64 },
    /// Generation failed; the inbound turn is kept, no reply was stored.
    Apology,
}

/// Coordinates one chat turn end to end.
///
/// Order within a turn: the inbound text is stored before context is built,
/// and the reply is stored before it is returned.
pub struct ChatOrchestrator {
    db: Database,
    brain: Arc<dyn Brain>,
    entitlement: Arc<EntitlementService>,
    memory: ConversationMemory,
    persona: Persona,
    clock: Arc<dyn Clock>,
    generation_timeout: Duration,
}

impl ChatOrchestrator {
    pub fn new(
        db: Database,
        brain: Arc<dyn Brain>,
        entitlement: Arc<EntitlementService>,
        clock: Arc<dyn Clock>,
        persona: Persona,
        config: OrchestratorConfig,
    ) -> Self {
        let memory = ConversationMemory::new(
            db.clone(),
            brain.clone(),
            clock.clone(),
            config.memory,
            config.generation_timeout,
        );
        info!(
            brain = brain.name(),
            persona = %persona.fingerprint,
            max_history = memory.settings().max_history,
            "Chat orchestrator ready"
        );
        Self {
            db,
            brain,
            entitlement,
            memory,
            persona,
            clock,
            generation_timeout: config.generation_timeout,
        }
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    /// Process an inbound message and decide the reply.
    pub async fn handle_message(&self, inbound: &InboundMessage) -> Result<Reply> {
        let text = inbound.text.trim();
        if text.is_empty() {
            return Err(OrchestratorError::Rejected("empty message".to_string()));
        }
        let user_id = inbound.user_id;

        user::upsert_user(self.db.pool(), &inbound.profile(), self.clock.now()).await?;

        let admission = self.entitlement.admit(user_id).await?;
        let free_remaining = match admission {
            Admission::Exhausted { limit } => {
                info!(user_id, limit, "Free tier exhausted, message not processed");
                return Ok(Reply::LimitReached { limit });
            }
            Admission::Free { remaining } => Some(remaining),
            Admission::Entitled(_) | Admission::Privileged => None,
        };
        debug!(user_id, ?admission, "Message admitted");

        self.memory.append(user_id, MessageRole::User, text).await?;

        if let Err(e) = self.memory.maybe_summarize(user_id).await {
            warn!(user_id, error = %e, "Summarization failed, continuing with full history");
        }

        let context = self.memory.build_context(user_id).await?;

        let generated = match tokio::time::timeout(
            self.generation_timeout,
            self.brain.generate(&self.persona.text, &context),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(BrainError::Timeout),
        };

        let answer = match generated {
            Ok(answer) if !answer.trim().is_empty() => answer.trim().to_string(),
            Ok(_) => {
                error!(user_id, "Generator returned an empty reply");
                return Ok(Reply::Apology);
            }
            Err(e) => {
                error!(user_id, error = %e, transient = e.is_transient(), "Reply generation failed");
                return Ok(Reply::Apology);
            }
        };

        self.memory.append(user_id, MessageRole::Assistant, &answer).await?;
        info!(user_id, reply_chars = answer.chars().count(), "Reply generated");

        Ok(Reply::Answer {
            text: answer,
            free_remaining,
        })
    }

    /// Explicit reset requested by the user. Returns deleted turn count.
    pub async fn reset(&self, user_id: i64) -> Result<u64> {
        self.memory.reset_with_summary(user_id).await
    }
}
