//! Telegram Bot API HTTP client.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::BotConfig;
use crate::error::TelegramError;
use crate::types::{AnswerPreCheckoutParams, SendInvoiceParams, SendMessageParams, SentMessage};

/// Bot API response envelope.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<i32>,
}

impl<T> ApiResponse<T> {
    fn into_result(self) -> Result<T, TelegramError> {
        if !self.ok {
            return Err(TelegramError::Api {
                code: self.error_code.unwrap_or(-1),
                description: self.description.unwrap_or_default(),
            });
        }
        self.result.ok_or_else(|| TelegramError::Api {
            code: -1,
            description: "No result in response".to_string(),
        })
    }
}

/// Bot identity returned by `getMe`.
#[derive(Debug, Clone, Deserialize)]
pub struct BotUser {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

/// Client for the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramClient {
    http: Client,
    config: BotConfig,
}

impl TelegramClient {
    /// Create a client. No request is made until the first call.
    pub fn new(config: BotConfig) -> Result<Self, TelegramError> {
        if config.token.trim().is_empty() {
            return Err(TelegramError::Config("bot token is empty".to_string()));
        }
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(TelegramError::Http)?;
        Ok(Self { http, config })
    }

    /// Get the configuration.
    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    /// Check the token by asking who the bot is.
    pub async fn get_me(&self) -> Result<BotUser, TelegramError> {
        self.call::<(), _>("getMe", None).await
    }

    /// Send a message.
    pub async fn send_message(&self, params: &SendMessageParams) -> Result<SentMessage, TelegramError> {
        self.call("sendMessage", Some(params)).await
    }

    /// Send a plain text message to a chat.
    pub async fn send_text(&self, chat_id: i64, text: &str) -> Result<SentMessage, TelegramError> {
        self.send_message(&SendMessageParams::text(chat_id, text)).await
    }

    /// Send an invoice.
    pub async fn send_invoice(&self, params: &SendInvoiceParams) -> Result<SentMessage, TelegramError> {
        self.call("sendInvoice", Some(params)).await
    }

    /// Accept or reject a pre-checkout query.
    pub async fn answer_pre_checkout_query(
        &self,
        query_id: &str,
        error_message: Option<&str>,
    ) -> Result<(), TelegramError> {
        let params = AnswerPreCheckoutParams {
            pre_checkout_query_id: query_id.to_string(),
            ok: error_message.is_none(),
            error_message: error_message.map(str::to_string),
        };
        let _: bool = self.call("answerPreCheckoutQuery", Some(&params)).await?;
        Ok(())
    }

    /// Call a Bot API method with JSON parameters.
    async fn call<P: Serialize + ?Sized, R: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        params: Option<&P>,
    ) -> Result<R, TelegramError> {
        let url = self.config.method_url(method);
        debug!(method, "Bot API call");

        let mut request = self.http.post(&url);
        if let Some(params) = params {
            request = request.json(params);
        }

        let response = request.send().await.map_err(TelegramError::Http)?;
        // The Bot API reports errors in the body with non-2xx codes too.
        let body = response.text().await.map_err(TelegramError::Http)?;
        parse_response(&body)
    }
}

fn parse_response<R: for<'de> Deserialize<'de>>(body: &str) -> Result<R, TelegramError> {
    let response: ApiResponse<R> = serde_json::from_str(body)?;
    response.into_result()
}
