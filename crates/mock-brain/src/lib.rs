//! Mock reply generators for tests.
//!
//! - `EchoBrain` - repeats the last user turn
//! - `ScriptedBrain` - returns queued replies and records every call
//! - `FailingBrain` - always fails with a chosen error
//! - `DelayedBrain` - wraps another brain with artificial delay
//!
//! # Example
//!
//! ```rust
//! use mock_brain::{Brain, EchoBrain, HistoryMessage};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mock_brain::BrainError> {
//!     let brain = EchoBrain::new();
//!     let reply = brain
//!         .generate("be brief", &[HistoryMessage::user("Hello!")])
//!         .await?;
//!     assert_eq!(reply, "Hello!");
//!     Ok(())
//! }
//! ```

mod delayed;
mod echo;
mod failing;
mod scripted;

// Re-export brain-core types for convenience
pub use brain_core::{async_trait, Brain, BrainError, HistoryMessage};

pub use delayed::DelayedBrain;
pub use echo::EchoBrain;
pub use failing::FailingBrain;
pub use scripted::{RecordedCall, ScriptedBrain};
