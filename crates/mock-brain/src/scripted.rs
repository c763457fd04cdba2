//! Scripted brain - queued replies plus a record of every call.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use brain_core::{async_trait, Brain, BrainError, HistoryMessage};

/// One call observed by a [`ScriptedBrain`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub persona: String,
    pub messages: Vec<HistoryMessage>,
}

/// Queued outcome: a reply, or a failure message surfaced as `ProcessingFailed`.
type Outcome = Result<String, String>;

/// A brain that answers from a queue and falls back to a fixed reply.
///
/// Clones share the queue and the call log, so a test can keep a handle
/// while the code under test owns another.
#[derive(Debug, Clone)]
pub struct ScriptedBrain {
    fallback: String,
    queue: Arc<Mutex<VecDeque<Outcome>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl ScriptedBrain {
    /// Always answer with `reply` unless something is queued.
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            fallback: reply.into(),
            queue: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a reply for the next call.
    pub fn push_reply(&self, reply: impl Into<String>) -> &Self {
        if let Ok(mut queue) = self.queue.lock() {
            queue.push_back(Ok(reply.into()));
        }
        self
    }

    /// Queue a failure for the next call.
    pub fn push_failure(&self, reason: impl Into<String>) -> &Self {
        if let Ok(mut queue) = self.queue.lock() {
            queue.push_back(Err(reason.into()));
        }
        self
    }

    /// Every call made so far, oldest first.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }
}

#[async_trait]
impl Brain for ScriptedBrain {
    async fn generate(&self, persona: &str, messages: &[HistoryMessage]) -> Result<String, BrainError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                persona: persona.to_string(),
                messages: messages.to_vec(),
            });
        }

        let next = self.queue.lock().ok().and_then(|mut q| q.pop_front());
        match next {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(reason)) => Err(BrainError::ProcessingFailed(reason)),
            None => Ok(self.fallback.clone()),
        }
    }

    fn name(&self) -> &str {
        "ScriptedBrain"
    }
}
