//! ChatBrain implementation over hosted chat APIs.

use brain_core::{async_trait, Brain, BrainError, HistoryMessage};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::api_types::{
    ApiError, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, MessagesRequest,
    MessagesResponse,
};
use crate::config::{ChatBrainConfig, Provider};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// A reply generator backed by a hosted chat API.
///
/// Stateless: conversation context is assembled by the caller and passed in
/// full on every call.
pub struct ChatBrain {
    client: Client,
    config: ChatBrainConfig,
}

impl ChatBrain {
    /// Create a new ChatBrain with the given configuration.
    pub fn new(config: ChatBrainConfig) -> Result<Self, BrainError> {
        if config.provider.requires_api_key() && config.api_key.is_none() {
            return Err(BrainError::Configuration(format!(
                "{} requires an API key",
                config.provider
            )));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BrainError::Configuration(format!("Failed to create HTTP client: {e}")))?;

        info!(
            provider = %config.provider,
            model = %config.model,
            timeout_secs = config.timeout.as_secs(),
            "ChatBrain initialized"
        );

        Ok(Self { client, config })
    }

    /// Create a ChatBrain from environment variables.
    ///
    /// See [`ChatBrainConfig::from_env`] for the variables read.
    pub fn from_env() -> Result<Self, BrainError> {
        Self::new(ChatBrainConfig::from_env()?)
    }

    /// Get the configuration.
    pub fn config(&self) -> &ChatBrainConfig {
        &self.config
    }

    async fn post_json<Req, Resp>(
        &self,
        url: &str,
        request: &Req,
        headers: &[(&str, String)],
    ) -> Result<Resp, BrainError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let mut builder = self.client.post(url).json(request);
        for (name, value) in headers {
            builder = builder.header(*name, value);
        }

        let response = builder.send().await.map_err(map_send_error)?;
        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(map_status_error(status, &error_text));
        }

        response
            .json()
            .await
            .map_err(|e| BrainError::ProcessingFailed(format!("Failed to parse response: {e}")))
    }

    async fn chat_completion(&self, persona: &str, messages: &[HistoryMessage]) -> Result<String, BrainError> {
        let base = self.config.api_url.trim_end_matches('/');
        let url = format!("{base}/v1/chat/completions");

        let request = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: openai_messages(persona, messages),
            max_tokens: Some(self.config.max_tokens),
            temperature: self.config.temperature,
        };

        let mut headers = Vec::new();
        if let Some(key) = &self.config.api_key {
            headers.push(("Authorization", format!("Bearer {key}")));
        }

        let completion: ChatCompletionResponse = self.post_json(&url, &request, &headers).await?;

        if let Some(usage) = &completion.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Chat completion usage"
            );
        }

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| BrainError::ProcessingFailed("empty completion".to_string()))
    }

    async fn anthropic_messages(&self, persona: &str, messages: &[HistoryMessage]) -> Result<String, BrainError> {
        let base = self.config.api_url.trim_end_matches('/');
        let url = format!("{base}/v1/messages");

        let request = MessagesRequest {
            model: self.config.model.clone(),
            system: persona.to_string(),
            messages: anthropic_messages(messages),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let mut headers = vec![("anthropic-version", ANTHROPIC_VERSION.to_string())];
        if let Some(key) = &self.config.api_key {
            headers.push(("x-api-key", key.clone()));
        }

        let response: MessagesResponse = self.post_json(&url, &request, &headers).await?;

        if let Some(usage) = &response.usage {
            debug!(
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                "Messages usage"
            );
        }

        let text = response.text();
        if text.trim().is_empty() {
            warn!(stop_reason = ?response.stop_reason, "Anthropic returned no text");
            return Err(BrainError::ProcessingFailed("empty completion".to_string()));
        }
        Ok(text)
    }
}

#[async_trait]
impl Brain for ChatBrain {
    async fn generate(&self, persona: &str, messages: &[HistoryMessage]) -> Result<String, BrainError> {
        debug!(
            provider = %self.config.provider,
            turns = messages.len(),
            "Generating reply"
        );

        match self.config.provider {
            Provider::OpenAi | Provider::Ollama => self.chat_completion(persona, messages).await,
            Provider::Anthropic => self.anthropic_messages(persona, messages).await,
        }
    }

    fn name(&self) -> &str {
        "ChatBrain"
    }
}

/// Persona as a leading system turn, then the conversation.
fn openai_messages(persona: &str, messages: &[HistoryMessage]) -> Vec<ChatMessage> {
    let mut out = Vec::with_capacity(messages.len() + 1);
    if !persona.trim().is_empty() {
        out.push(ChatMessage::new("system", persona));
    }
    out.extend(
        messages
            .iter()
            .map(|m| ChatMessage::new(m.role.as_str(), m.content.as_str())),
    );
    out
}

/// Anthropic wants the conversation to open with a user turn; consecutive
/// turns of one role are merged and stray system turns are dropped.
fn anthropic_messages(messages: &[HistoryMessage]) -> Vec<ChatMessage> {
    let mut out: Vec<ChatMessage> = Vec::with_capacity(messages.len());
    for message in messages.iter().filter(|m| m.role != "system") {
        if out.is_empty() && !message.is_user() {
            continue;
        }
        match out.last_mut() {
            Some(last) if last.role == message.role => {
                last.content.push_str("\n\n");
                last.content.push_str(&message.content);
            }
            _ => out.push(ChatMessage::new(message.role.as_str(), message.content.as_str())),
        }
    }
    out
}

fn map_send_error(err: reqwest::Error) -> BrainError {
    if err.is_timeout() {
        BrainError::Timeout
    } else {
        BrainError::Network(format!("Failed to send request: {err}"))
    }
}

fn map_status_error(status: StatusCode, body: &str) -> BrainError {
    let detail = serde_json::from_str::<ApiError>(body)
        .map(|api_error| api_error.error.message)
        .unwrap_or_else(|_| body.to_string());
    let message = format!("API error ({}): {}", status.as_u16(), detail);

    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        BrainError::Unavailable(message)
    } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        BrainError::Configuration(message)
    } else {
        BrainError::ProcessingFailed(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openai_messages_prepend_persona() {
        let messages = openai_messages(
            "be kind",
            &[HistoryMessage::user("hi"), HistoryMessage::assistant("hello")],
        );
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0], ChatMessage::new("system", "be kind"));
        assert_eq!(messages[2].role, "assistant");

        assert_eq!(openai_messages("  ", &[HistoryMessage::user("hi")]).len(), 1);
    }

    #[test]
    fn anthropic_messages_merge_and_open_with_user() {
        let messages = anthropic_messages(&[
            HistoryMessage::assistant("dangling"),
            HistoryMessage::user("[memory]"),
            HistoryMessage::user("hello"),
            HistoryMessage::system("ignored"),
            HistoryMessage::assistant("hi"),
        ]);
        assert_eq!(
            messages,
            vec![
                ChatMessage::new("user", "[memory]\n\nhello"),
                ChatMessage::new("assistant", "hi"),
            ]
        );
    }

    #[test]
    fn status_errors_are_classified() {
        let body = r#"{"error": {"message": "slow down", "type": "rate_limit_error"}}"#;
        match map_status_error(StatusCode::TOO_MANY_REQUESTS, body) {
            BrainError::Unavailable(msg) => assert!(msg.contains("slow down")),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            map_status_error(StatusCode::UNAUTHORIZED, "nope"),
            BrainError::Configuration(_)
        ));
        assert!(matches!(
            map_status_error(StatusCode::BAD_REQUEST, "bad"),
            BrainError::ProcessingFailed(_)
        ));
    }

    #[test]
    fn new_requires_key_for_hosted_providers() {
        let missing = ChatBrain::new(ChatBrainConfig::for_provider(Provider::OpenAi));
        assert!(matches!(missing, Err(BrainError::Configuration(_))));

        let ollama = ChatBrain::new(ChatBrainConfig::for_provider(Provider::Ollama)).unwrap();
        assert_eq!(ollama.name(), "ChatBrain");
    }
}
