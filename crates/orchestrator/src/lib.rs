//! Chat turn pipeline for the support bot.
//!
//! # Architecture
//!
//! ```text
//! Inbound message (from the transport)
//!          ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   CHAT ORCHESTRATOR                         │
//! │                                                             │
//! │  1. Register the user / refresh last interaction            │
//! │         ↓                                                   │
//! │  2. Entitlement gate (subscription, grace, free counter)    │
//! │         ↓                                                   │
//! │  3. Store the inbound turn                                  │
//! │         ↓                                                   │
//! │  4. Summarize overflow into long-term memory (best-effort)  │
//! │         ↓                                                   │
//! │  5. Build context: memory turn + recent window              │
//! │         ↓                                                   │
//! │  6. Generate with a deadline                                │
//! │         ↓                                                   │
//! │  7. Store the reply and hand it back                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod context;
mod error;
mod memory;
mod orchestrator;
mod persona;

pub use config::{MemorySettings, OrchestratorConfig};
pub use context::{build_context, summary_request, MEMORY_TAG, SUMMARIZER_PERSONA};
pub use error::{OrchestratorError, Result};
pub use memory::ConversationMemory;
pub use orchestrator::{ChatOrchestrator, InboundMessage, Reply};
pub use persona::{load_persona, load_prompt_file, Persona, DEFAULT_PERSONA, DEFAULT_PROMPT_FILE};

pub use brain_core::{Brain, HistoryMessage};
