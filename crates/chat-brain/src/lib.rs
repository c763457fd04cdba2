//! Hosted LLM reply generator.
//!
//! [`ChatBrain`] implements [`brain_core::Brain`] on top of either an
//! OpenAI-compatible chat completions endpoint (OpenAI, Ollama) or the
//! Anthropic Messages API. The backend is chosen by `AI_PROVIDER`.
//!
//! ```rust,no_run
//! use chat_brain::{Brain, ChatBrain, HistoryMessage};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let brain = ChatBrain::from_env()?;
//!     let reply = brain
//!         .generate("You are a calm listener.", &[HistoryMessage::user("Hi")])
//!         .await?;
//!     println!("{reply}");
//!     Ok(())
//! }
//! ```

mod api_types;
mod brain;
mod config;

pub use brain::ChatBrain;
pub use config::{ChatBrainConfig, Provider};

// Re-export brain-core types for convenience
pub use brain_core::{async_trait, Brain, BrainError, HistoryMessage};
