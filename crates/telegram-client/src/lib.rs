//! Telegram Bot API client.
//!
//! Covers the outbound calls the billing side needs:
//!
//! - Sending plain notifications (`sendMessage`)
//! - Sending card and Stars invoices (`sendInvoice`)
//! - Answering pre-checkout queries (`answerPreCheckoutQuery`)
//!
//! # Example
//!
//! ```no_run
//! use telegram_client::{BotConfig, TelegramClient};
//!
//! # async fn example() -> Result<(), telegram_client::TelegramError> {
//! let client = TelegramClient::new(BotConfig::new("123:ABC"))?;
//! client.send_text(42, "Your subscription is active").await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod types;

pub use client::{BotUser, TelegramClient};
pub use config::BotConfig;
pub use error::TelegramError;
pub use types::*;
