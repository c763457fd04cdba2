//! MixPay one-time payment client: card or crypto in, USDT settled.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::RailError;
use crate::traits::InvoiceGateway;
use crate::types::{format_cents, Invoice, InvoiceStatus};

/// USDT asset id on the Mixin network.
const USDT_ASSET_ID: &str = "4d8c508b-91c5-375b-92b0-ee702ed2dac5";

/// Configuration for the MixPay client.
#[derive(Debug, Clone)]
pub struct MixPayConfig {
    pub api_url: String,
    /// Base for user-facing payment links.
    pub pay_url: String,
    pub payee_id: String,
    /// How long a created invoice stays payable.
    pub invoice_ttl: Duration,
    pub timeout: Duration,
}

impl MixPayConfig {
    pub fn new(payee_id: impl Into<String>) -> Self {
        Self {
            api_url: "https://api.mixpay.me/v1".to_string(),
            pay_url: "https://mixpay.me/code".to_string(),
            payee_id: payee_id.into(),
            invoice_ttl: Duration::from_secs(3600),
            timeout: Duration::from_secs(15),
        }
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OneTimePaymentRequest<'a> {
    payee_id: &'a str,
    quote_asset_id: &'a str,
    quote_amount: String,
    settlement_asset_id: &'a str,
    strict_mode: bool,
    order_id: &'a str,
    expired_timestamp: i64,
    #[serde(skip_serializing_if = "str::is_empty")]
    remark: &'a str,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct OneTimePaymentData {
    code: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentResultData {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    failure_reason: Option<String>,
}

/// Map a MixPay status string. Unknown values count as unpaid.
fn parse_status(status: &str) -> InvoiceStatus {
    match status {
        "success" => InvoiceStatus::Paid,
        "pending" => InvoiceStatus::Pending,
        "failed" => InvoiceStatus::Failed,
        "unpaid" => InvoiceStatus::Unpaid,
        other => {
            warn!(status = other, "Unknown MixPay status, treating as unpaid");
            InvoiceStatus::Unpaid
        }
    }
}

/// Interpret a `payments_result` body.
///
/// MixPay answers `success: false` for orders it has not seen a payment
/// for yet, which is an unpaid invoice rather than an error.
pub(crate) fn parse_payment_result(body: &str) -> Result<InvoiceStatus, RailError> {
    let envelope: Envelope<PaymentResultData> = serde_json::from_str(body)?;
    if !envelope.success {
        return Ok(InvoiceStatus::Unpaid);
    }
    let data = envelope.data.unwrap_or(PaymentResultData {
        status: None,
        failure_reason: None,
    });
    let status = parse_status(data.status.as_deref().unwrap_or("unpaid"));
    if let (InvoiceStatus::Failed, Some(reason)) = (status, data.failure_reason.as_deref()) {
        warn!(reason, "MixPay payment failed");
    }
    Ok(status)
}

/// Client for the MixPay REST API.
#[derive(Clone)]
pub struct MixPayClient {
    http: Client,
    config: MixPayConfig,
}

impl MixPayClient {
    pub fn new(config: MixPayConfig) -> Result<Self, RailError> {
        if config.payee_id.trim().is_empty() {
            return Err(RailError::Config("MixPay payee id is empty".to_string()));
        }
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    fn pay_url(&self, code: &str) -> String {
        format!("{}/{}", self.config.pay_url, code)
    }
}

#[async_trait]
impl InvoiceGateway for MixPayClient {
    async fn create_invoice(
        &self,
        order_id: &str,
        amount_cents: i64,
        description: &str,
    ) -> Result<Invoice, RailError> {
        let expires = Utc::now()
            + chrono::Duration::from_std(self.config.invoice_ttl)
                .map_err(|e| RailError::Config(format!("invoice ttl out of range: {e}")))?;

        let request = OneTimePaymentRequest {
            payee_id: &self.config.payee_id,
            quote_asset_id: "usd",
            quote_amount: format_cents(amount_cents),
            settlement_asset_id: USDT_ASSET_ID,
            strict_mode: true,
            order_id,
            expired_timestamp: expires.timestamp(),
            remark: description,
        };

        let url = format!("{}/one_time_payment", self.config.api_url);
        let response = self.http.post(&url).json(&request).send().await?;
        let status = response.status();
        let body = response.text().await?;

        let envelope: Envelope<OneTimePaymentData> = serde_json::from_str(&body)?;
        match envelope.data {
            Some(data) if envelope.success && !data.code.is_empty() => {
                let invoice = Invoice {
                    order_id: order_id.to_string(),
                    pay_url: self.pay_url(&data.code),
                    code: data.code,
                };
                info!(order_id, pay_url = %invoice.pay_url, "MixPay invoice created");
                Ok(invoice)
            }
            _ => Err(RailError::Api {
                status: status.as_u16(),
                message: envelope
                    .message
                    .unwrap_or_else(|| "invoice creation failed".to_string()),
            }),
        }
    }

    async fn invoice_status(&self, order_id: &str) -> Result<InvoiceStatus, RailError> {
        let url = format!("{}/payments_result", self.config.api_url);
        let response = self
            .http
            .get(&url)
            .query(&[("orderId", order_id), ("payeeId", self.config.payee_id.as_str())])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if status.is_server_error() {
            return Err(RailError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        parse_payment_result(&body)
    }

    fn name(&self) -> &str {
        "mixpay"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_result_statuses() {
        let paid = r#"{"code":0,"success":true,"message":"","data":{"status":"success","quoteAmount":"20"}}"#;
        assert_eq!(parse_payment_result(paid).unwrap(), InvoiceStatus::Paid);

        let pending = r#"{"success":true,"data":{"status":"pending"}}"#;
        assert_eq!(parse_payment_result(pending).unwrap(), InvoiceStatus::Pending);

        let failed = r#"{"success":true,"data":{"status":"failed","failureReason":"expired"}}"#;
        assert_eq!(parse_payment_result(failed).unwrap(), InvoiceStatus::Failed);

        let unseen = r#"{"success":false,"message":"order not found"}"#;
        assert_eq!(parse_payment_result(unseen).unwrap(), InvoiceStatus::Unpaid);
    }

    #[test]
    fn malformed_body_is_json_error() {
        assert!(matches!(parse_payment_result("<html>"), Err(RailError::Json(_))));
    }

    #[test]
    fn request_serializes_camel_case() {
        let request = OneTimePaymentRequest {
            payee_id: "payee",
            quote_asset_id: "usd",
            quote_amount: format_cents(2000),
            settlement_asset_id: USDT_ASSET_ID,
            strict_mode: true,
            order_id: "psy-1-monthly-abcd1234",
            expired_timestamp: 1,
            remark: "",
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["payeeId"], "payee");
        assert_eq!(json["quoteAmount"], "20.00");
        assert_eq!(json["strictMode"], true);
        assert!(json.get("remark").is_none());
    }

    #[test]
    fn empty_payee_is_rejected() {
        assert!(matches!(
            MixPayClient::new(MixPayConfig::new("")),
            Err(RailError::Config(_))
        ));
        let client = MixPayClient::new(MixPayConfig::new("payee")).unwrap();
        assert_eq!(client.pay_url("abc"), "https://mixpay.me/code/abc");
    }
}
