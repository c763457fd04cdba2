//! Core trait and types for reply generators.
//!
//! - [`Brain`] - the interface every generator backend implements
//! - [`HistoryMessage`] - one role-tagged turn handed to a generator
//! - [`BrainError`] - generator failures
//!
//! # Example
//!
//! ```rust
//! use brain_core::{async_trait, Brain, BrainError, HistoryMessage};
//!
//! struct Polite;
//!
//! #[async_trait]
//! impl Brain for Polite {
//!     async fn generate(
//!         &self,
//!         _persona: &str,
//!         messages: &[HistoryMessage],
//!     ) -> Result<String, BrainError> {
//!         let last = messages.last().map(|m| m.content.as_str()).unwrap_or("");
//!         Ok(format!("You said: {last}"))
//!     }
//!
//!     fn name(&self) -> &str {
//!         "Polite"
//!     }
//! }
//! ```

mod error;
mod history;
mod prompt;
mod trait_def;

pub use error::BrainError;
pub use history::HistoryMessage;
pub use prompt::{hash_prompt, short_fingerprint};
pub use trait_def::Brain;

// Re-export async_trait for convenience
pub use async_trait::async_trait;
