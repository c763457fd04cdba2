//! Application state shared across handlers.

use std::sync::Arc;

use billing::{EntitlementService, PaymentEngine, SubscriptionManager};
use database::Database;
use orchestrator::ChatOrchestrator;

use crate::telegram::TelegramChannel;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub orchestrator: Arc<ChatOrchestrator>,
    pub entitlement: Arc<EntitlementService>,
    pub subscriptions: Arc<SubscriptionManager>,
    pub payments: Arc<PaymentEngine>,
    /// Invoice channel for Stars and card checkout.
    pub telegram: Option<TelegramChannel>,
    /// Shown to users paying on the crypto rail.
    pub wallet_address: Option<String>,
    /// Bearer token for `/v1`; `None` disables the check.
    pub api_token: Option<Arc<str>>,
}
