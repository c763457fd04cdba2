//! Integration tests for telegram-client.
//!
//! Live tests need a bot token and a chat to write to:
//!   TELEGRAM_BOT_TOKEN=... TELEGRAM_TEST_CHAT_ID=... \
//!     cargo test --test integration_tests -- --ignored

use std::env;

use telegram_client::{BotConfig, SendInvoiceParams, TelegramClient};

fn live_client() -> Option<(TelegramClient, i64)> {
    let _ = dotenvy::dotenv();
    let token = env::var("TELEGRAM_BOT_TOKEN").ok()?;
    let chat_id = env::var("TELEGRAM_TEST_CHAT_ID").ok()?.parse().ok()?;
    let client = TelegramClient::new(BotConfig::new(token)).ok()?;
    Some((client, chat_id))
}

mod config_tests {
    use super::*;

    #[test]
    fn test_default_base_url() {
        let config = BotConfig::new("123:ABC");
        assert_eq!(config.base_url, "https://api.telegram.org");
        assert!(!config.card_payments_enabled());
    }

    #[test]
    fn test_method_url() {
        let config = BotConfig::new("123:ABC").with_base_url("http://localhost:8081/");
        assert_eq!(config.method_url("sendMessage"), "http://localhost:8081/bot123:ABC/sendMessage");
    }

    #[test]
    fn test_provider_token() {
        assert!(BotConfig::new("t").with_provider_token("prov").card_payments_enabled());
        assert!(!BotConfig::new("t").with_provider_token("").card_payments_enabled());
    }
}

mod live_tests {
    use super::*;

    #[tokio::test]
    #[ignore]
    async fn test_get_me() {
        let Some((client, _)) = live_client() else {
            eprintln!("TELEGRAM_BOT_TOKEN / TELEGRAM_TEST_CHAT_ID not set, skipping");
            return;
        };
        let me = client.get_me().await.expect("getMe failed");
        assert!(me.id > 0);
    }

    #[tokio::test]
    #[ignore]
    async fn test_send_text_and_stars_invoice() {
        let Some((client, chat_id)) = live_client() else {
            eprintln!("TELEGRAM_BOT_TOKEN / TELEGRAM_TEST_CHAT_ID not set, skipping");
            return;
        };
        client
            .send_text(chat_id, "telegram-client integration test")
            .await
            .expect("sendMessage failed");

        let invoice = SendInvoiceParams::stars(chat_id, "Test", "Integration test", "stars:monthly:0", 1);
        client.send_invoice(&invoice).await.expect("sendInvoice failed");
    }
}
