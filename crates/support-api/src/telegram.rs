//! Telegram delivery for notices and invoices.

use async_trait::async_trait;
use billing::{
    BillingError, InvoiceSender, Notice, Notifier, PayloadKind, Plan, ProviderPayload,
};
use chrono::{DateTime, Utc};
use database::{ReminderKind, Subscription};
use telegram_client::{SendInvoiceParams, TelegramClient, TelegramError};
use tracing::{debug, info};

/// Sends notices with `sendMessage` and invoices with `sendInvoice`.
#[derive(Clone)]
pub struct TelegramChannel {
    client: TelegramClient,
}

impl TelegramChannel {
    pub fn new(client: TelegramClient) -> Self {
        Self { client }
    }

    pub fn card_payments_enabled(&self) -> bool {
        self.client.config().card_payments_enabled()
    }

    /// Send a checkout invoice for `plan` on the Stars or card rail.
    /// Returns the payload the provider will echo back.
    pub async fn send_checkout_invoice(
        &self,
        user_id: i64,
        plan: &'static Plan,
        kind: PayloadKind,
    ) -> billing::Result<String> {
        let payload = ProviderPayload::new(kind, plan, user_id).to_string();
        let params = match kind {
            PayloadKind::Stars => {
                SendInvoiceParams::stars(user_id, plan.title, plan.description(), &payload, plan.stars)
            }
            _ => self.card_invoice(user_id, plan, &payload)?,
        };
        self.client.send_invoice(&params).await.map_err(delivery)?;
        info!(user_id, plan = plan.id, kind = kind.as_str(), "Checkout invoice sent");
        Ok(payload)
    }

    fn card_invoice(&self, user_id: i64, plan: &Plan, payload: &str) -> billing::Result<SendInvoiceParams> {
        let token = self
            .client
            .config()
            .provider_token
            .as_deref()
            .ok_or_else(|| BillingError::NotConfigured("card payments".to_string()))?;
        Ok(SendInvoiceParams::card(
            user_id,
            plan.title,
            plan.description(),
            payload,
            token,
            plan.price_cents,
        ))
    }
}

#[async_trait]
impl Notifier for TelegramChannel {
    async fn notify(&self, user_id: i64, notice: &Notice) -> billing::Result<()> {
        let text = render_notice(notice);
        self.client.send_text(user_id, &text).await.map_err(delivery)?;
        debug!(user_id, notice = notice.kind(), "Notice delivered");
        Ok(())
    }
}

#[async_trait]
impl InvoiceSender for TelegramChannel {
    async fn send_renewal_invoice(&self, subscription: &Subscription, plan: &Plan) -> billing::Result<()> {
        let plan = Plan::require(plan.id)?;
        let payload = ProviderPayload::new(PayloadKind::Renewal, plan, subscription.user_id).to_string();
        let params = self.card_invoice(subscription.user_id, plan, &payload)?;
        self.client.send_invoice(&params).await.map_err(delivery)?;
        Ok(())
    }
}

fn delivery(err: TelegramError) -> BillingError {
    BillingError::Delivery(err.to_string())
}

fn date(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d").to_string()
}

fn plan_title(plan_id: &str) -> &str {
    Plan::find(plan_id).map(|plan| plan.title).unwrap_or(plan_id)
}

/// Plain-text rendering of a notice.
pub fn render_notice(notice: &Notice) -> String {
    match notice {
        Notice::SubscriptionActivated { plan, expires_at } => format!(
            "Payment received. Your {} is active until {}.",
            plan_title(plan),
            date(expires_at)
        ),
        Notice::SubscriptionGranted { plan, expires_at } => format!(
            "You have been given a {} until {}. Enjoy!",
            plan_title(plan),
            date(expires_at)
        ),
        Notice::ExpiryReminder { kind, plan, expires_at } => match kind {
            ReminderKind::ThreeDays => format!(
                "Your {} ends in 3 days, on {}.",
                plan_title(plan),
                date(expires_at)
            ),
            ReminderKind::OneDay => format!(
                "Your {} ends tomorrow, {}.",
                plan_title(plan),
                date(expires_at)
            ),
            ReminderKind::Expired => format!(
                "Your {} has ended. Renew any time to keep talking without limits.",
                plan_title(plan)
            ),
        },
        Notice::AutoRenewDisabled { expires_at } => format!(
            "Auto-renewal is off. Your access stays until {}.",
            date(expires_at)
        ),
        Notice::SubscriptionCancelled { expires_at } => format!(
            "Your subscription was cancelled. It was due to end on {}.",
            date(expires_at)
        ),
        Notice::PaymentRejected { payment_id, reason } => {
            format!("Payment #{payment_id} was not accepted: {reason}")
        }
    }
}
