//! TonCenter HTTP API client for inbound wallet transfers.

use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::RailError;
use crate::traits::TransferFeed;
use crate::types::Transfer;

/// Configuration for the TonCenter client.
#[derive(Debug, Clone)]
pub struct TonCenterConfig {
    /// API base URL (e.g. "https://toncenter.com/api/v2").
    pub api_url: String,
    /// Receiving wallet address.
    pub address: String,
    /// Optional key lifting the anonymous rate limit.
    pub api_key: Option<String>,
    /// Transactions fetched per poll.
    pub limit: u32,
    pub timeout: Duration,
}

impl TonCenterConfig {
    pub const DEFAULT_API_URL: &'static str = "https://toncenter.com/api/v2";

    pub fn new(address: impl Into<String>) -> Self {
        Self {
            api_url: Self::DEFAULT_API_URL.to_string(),
            address: address.into(),
            api_key: None,
            limit: 20,
            timeout: Duration::from_secs(15),
        }
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Get the transactions endpoint URL.
    pub fn transactions_url(&self) -> String {
        format!("{}/getTransactions", self.api_url)
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    result: Vec<RawTransaction>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    code: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct RawTransaction {
    #[serde(default)]
    hash: Option<String>,
    #[serde(default)]
    transaction_id: Option<TransactionId>,
    #[serde(default)]
    utime: i64,
    #[serde(default)]
    in_msg: Option<InMessage>,
}

#[derive(Debug, Deserialize)]
struct TransactionId {
    #[serde(default)]
    hash: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InMessage {
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    value: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
}

/// Integer amount sent either as a JSON string or a number.
fn parse_amount(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::String(s) => s.trim().parse().ok(),
        serde_json::Value::Number(n) => n.as_i64(),
        _ => None,
    }
}

impl RawTransaction {
    /// Inbound value transfers only; external and zero-value messages are skipped.
    fn into_transfer(self) -> Option<Transfer> {
        let hash = self
            .hash
            .or_else(|| self.transaction_id.and_then(|id| id.hash))
            .filter(|h| !h.is_empty())?;
        let in_msg = self.in_msg?;
        let source = in_msg.source.filter(|s| !s.is_empty())?;
        let amount_micro = in_msg.value.as_ref().and_then(parse_amount)?;
        if amount_micro <= 0 {
            return None;
        }
        let received_at = DateTime::from_timestamp(self.utime, 0)?;

        Some(Transfer {
            hash,
            amount_micro,
            received_at,
            source: Some(source),
            comment: in_msg.message.filter(|m| !m.is_empty()),
        })
    }
}

/// Parse a `getTransactions` body into inbound transfers.
pub(crate) fn parse_transactions(body: &str) -> Result<Vec<Transfer>, RailError> {
    let response: ApiResponse = serde_json::from_str(body)?;
    if !response.ok {
        return Err(RailError::Api {
            status: response.code.unwrap_or(500),
            message: response.error.unwrap_or_else(|| "request not ok".to_string()),
        });
    }
    Ok(response
        .result
        .into_iter()
        .filter_map(RawTransaction::into_transfer)
        .collect())
}

/// Client for the TonCenter v2 HTTP API.
#[derive(Clone)]
pub struct TonCenterClient {
    http: Client,
    config: TonCenterConfig,
}

impl TonCenterClient {
    pub fn new(config: TonCenterConfig) -> Result<Self, RailError> {
        if config.address.trim().is_empty() {
            return Err(RailError::Config("wallet address is empty".to_string()));
        }
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    /// Get the configuration.
    pub fn config(&self) -> &TonCenterConfig {
        &self.config
    }
}

#[async_trait]
impl TransferFeed for TonCenterClient {
    async fn recent_transfers(&self) -> Result<Vec<Transfer>, RailError> {
        let url = self.config.transactions_url();
        let limit = self.config.limit.to_string();
        let mut request = self
            .http
            .get(&url)
            .query(&[("address", self.config.address.as_str()), ("limit", limit.as_str())]);
        if let Some(key) = &self.config.api_key {
            request = request.header("X-API-Key", key);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "TonCenter returned an error status");
            return Err(RailError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let transfers = parse_transactions(&body)?;
        debug!(count = transfers.len(), "Fetched inbound transfers");
        Ok(transfers)
    }

    fn name(&self) -> &str {
        "toncenter"
    }
}
