//! Types for invoices and pre-checkout answers.

use serde::Serialize;

/// Currency code for Telegram Stars.
pub const STARS_CURRENCY: &str = "XTR";

/// A price line; `amount` is in the smallest currency unit (cents, or whole Stars).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabeledPrice {
    pub label: String,
    pub amount: i64,
}

/// Parameters for `sendInvoice`.
#[derive(Debug, Clone, Serialize)]
pub struct SendInvoiceParams {
    pub chat_id: i64,
    pub title: String,
    pub description: String,
    /// Bot-defined payload echoed back in the pre-checkout query and payment event.
    pub payload: String,
    /// Empty for Stars invoices.
    pub provider_token: String,
    pub currency: String,
    pub prices: Vec<LabeledPrice>,
}

impl SendInvoiceParams {
    /// Card invoice in USD cents.
    pub fn card(
        chat_id: i64,
        title: impl Into<String>,
        description: impl Into<String>,
        payload: impl Into<String>,
        provider_token: impl Into<String>,
        amount_cents: i64,
    ) -> Self {
        let title = title.into();
        Self {
            chat_id,
            prices: vec![LabeledPrice {
                label: title.clone(),
                amount: amount_cents,
            }],
            title,
            description: description.into(),
            payload: payload.into(),
            provider_token: provider_token.into(),
            currency: "USD".to_string(),
        }
    }

    /// Telegram Stars invoice.
    pub fn stars(
        chat_id: i64,
        title: impl Into<String>,
        description: impl Into<String>,
        payload: impl Into<String>,
        stars: i64,
    ) -> Self {
        let title = title.into();
        Self {
            chat_id,
            prices: vec![LabeledPrice {
                label: title.clone(),
                amount: stars,
            }],
            title,
            description: description.into(),
            payload: payload.into(),
            provider_token: String::new(),
            currency: STARS_CURRENCY.to_string(),
        }
    }
}

/// Parameters for `answerPreCheckoutQuery`.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerPreCheckoutParams {
    pub pre_checkout_query_id: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stars_invoice_has_no_provider_token() {
        let params = SendInvoiceParams::stars(1, "Monthly", "30 days", "stars:monthly:1", 1000);
        assert_eq!(params.currency, STARS_CURRENCY);
        assert!(params.provider_token.is_empty());
        assert_eq!(params.prices[0].amount, 1000);
    }

    #[test]
    fn card_invoice_serializes_prices() {
        let params = SendInvoiceParams::card(1, "Monthly", "30 days", "renewal:monthly:1", "tok", 2000);
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["currency"], "USD");
        assert_eq!(json["prices"][0]["amount"], 2000);
        assert_eq!(json["payload"], "renewal:monthly:1");
    }
}
