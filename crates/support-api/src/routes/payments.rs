//! Checkout, provider callbacks, invoice checks and cancellations.

use axum::extract::{Path, State};
use axum::Json;
use billing::{CancelMode, Completion, InvoiceCheck, PayloadKind, Plan, ProviderCompletion};
use chrono::{DateTime, Utc};
use database::{Payment, Subscription};
use payment_rails::InvoiceStatus;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ApiError, Result};
use crate::state::AppState;

/// Which rail the user picked at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rail {
    /// Manual transfer to the wallet, confirmed by an admin or the monitor.
    Crypto,
    /// Third-party invoice gateway.
    Invoice,
    Stars,
    Card,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub user_id: i64,
    pub plan: String,
    pub rail: Rail,
}

#[derive(Debug, Serialize)]
#[serde(tag = "rail", rename_all = "snake_case")]
pub enum CheckoutResponse {
    Crypto {
        payment_id: i64,
        amount_cents: i64,
        currency: String,
        wallet_address: Option<String>,
    },
    Invoice {
        payment_id: i64,
        amount_cents: i64,
        pay_url: String,
    },
    /// Invoice sent in chat; the provider will call back with `payload`.
    Stars { payload: String, stars: i64 },
    Card { payload: String, amount_cents: i64 },
}

pub async fn checkout(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>> {
    let plan = Plan::require(&request.plan)?;

    let response = match request.rail {
        Rail::Crypto => {
            let payment = state.payments.open_payment(request.user_id, plan.id).await?;
            CheckoutResponse::Crypto {
                payment_id: payment.id,
                amount_cents: payment.amount_cents,
                currency: payment.currency,
                wallet_address: state.wallet_address.clone(),
            }
        }
        Rail::Invoice => {
            let (payment, invoice) = state
                .payments
                .open_invoice_payment(request.user_id, plan.id)
                .await?;
            CheckoutResponse::Invoice {
                payment_id: payment.id,
                amount_cents: payment.amount_cents,
                pay_url: invoice.pay_url,
            }
        }
        Rail::Stars | Rail::Card => {
            let telegram = state
                .telegram
                .as_ref()
                .ok_or_else(|| ApiError::Unavailable("in-chat invoices are not configured".to_string()))?;
            if request.rail == Rail::Stars {
                let payload = telegram
                    .send_checkout_invoice(request.user_id, plan, PayloadKind::Stars)
                    .await?;
                CheckoutResponse::Stars {
                    payload,
                    stars: plan.stars,
                }
            } else {
                let payload = telegram
                    .send_checkout_invoice(request.user_id, plan, PayloadKind::Card)
                    .await?;
                CheckoutResponse::Card {
                    payload,
                    amount_cents: plan.price_cents,
                }
            }
        }
    };

    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct PreCheckoutRequest {
    pub payload: String,
}

/// Answer for the provider's pre-checkout query.
#[derive(Debug, Serialize)]
pub struct PreCheckoutResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

pub async fn pre_checkout(
    State(state): State<AppState>,
    Json(request): Json<PreCheckoutRequest>,
) -> Result<Json<PreCheckoutResponse>> {
    match state.payments.validate_pre_checkout(&request.payload).await {
        Ok(_) => Ok(Json(PreCheckoutResponse {
            ok: true,
            error_message: None,
        })),
        Err(err) if err.is_validation() => {
            warn!(payload = %request.payload, error = %err, "Pre-checkout rejected");
            Ok(Json(PreCheckoutResponse {
                ok: false,
                error_message: Some(err.to_string()),
            }))
        }
        Err(err) => Err(err.into()),
    }
}

#[derive(Debug, Deserialize)]
pub struct CompletedRequest {
    pub payload: String,
    pub charge_id: String,
    pub total_amount: i64,
    pub currency: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CompletedResponse {
    Activated {
        payment_id: i64,
        subscription: Subscription,
    },
    Duplicate {
        payment_id: i64,
    },
}

pub async fn provider_completed(
    State(state): State<AppState>,
    Json(request): Json<CompletedRequest>,
) -> Result<Json<CompletedResponse>> {
    let event = ProviderCompletion {
        payload: request.payload,
        charge_id: request.charge_id,
        total_amount: request.total_amount,
        currency: request.currency,
    };
    let response = match state.payments.complete_provider_payment(&event).await? {
        Completion::Activated {
            payment_id,
            subscription,
        } => CompletedResponse::Activated {
            payment_id,
            subscription,
        },
        Completion::Duplicate { payment_id } => CompletedResponse::Duplicate { payment_id },
    };
    Ok(Json(response))
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InvoiceCheckResponse {
    Activated { subscription: Subscription },
    AlreadyCompleted,
    Failed,
    Open { invoice_status: InvoiceStatus },
}

pub async fn check_invoice(
    State(state): State<AppState>,
    Path(payment_id): Path<i64>,
) -> Result<Json<InvoiceCheckResponse>> {
    let response = match state.payments.check_invoice(payment_id).await? {
        InvoiceCheck::Activated(subscription) => InvoiceCheckResponse::Activated { subscription },
        InvoiceCheck::AlreadyCompleted => InvoiceCheckResponse::AlreadyCompleted,
        InvoiceCheck::Failed => InvoiceCheckResponse::Failed,
        InvoiceCheck::Open(invoice_status) => InvoiceCheckResponse::Open { invoice_status },
    };
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct SelfCancelRequest {
    pub user_id: i64,
}

pub async fn self_cancel(
    State(state): State<AppState>,
    Path(payment_id): Path<i64>,
    Json(request): Json<SelfCancelRequest>,
) -> Result<Json<Payment>> {
    let payment = state.payments.self_cancel(payment_id, request.user_id).await?;
    Ok(Json(payment))
}

#[derive(Debug, Deserialize)]
pub struct CancelSubscriptionRequest {
    #[serde(default = "default_cancel_mode")]
    pub mode: CancelMode,
    #[serde(default)]
    pub reason: Option<String>,
}

fn default_cancel_mode() -> CancelMode {
    CancelMode::AutoRenewOff
}

#[derive(Debug, Serialize)]
pub struct CancelSubscriptionResponse {
    pub subscription_id: i64,
    pub auto_renew: bool,
    pub cancelled: bool,
    /// Access lasts until here either way.
    pub expires_at: DateTime<Utc>,
}

pub async fn cancel_subscription(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(request): Json<CancelSubscriptionRequest>,
) -> Result<Json<CancelSubscriptionResponse>> {
    let subscription = state
        .subscriptions
        .cancel(user_id, request.mode, request.reason.as_deref())
        .await?;
    info!(user_id, mode = ?request.mode, "Subscription cancel requested");
    Ok(Json(CancelSubscriptionResponse {
        subscription_id: subscription.id,
        auto_renew: subscription.auto_renew,
        cancelled: subscription.cancelled_at.is_some(),
        expires_at: subscription.expires_at,
    }))
}
