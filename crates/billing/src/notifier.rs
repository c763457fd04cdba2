//! Outbound user notifications and renewal invoices.
//!
//! Delivery is best-effort: failures are logged by the caller and never undo
//! the state change that triggered them.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use database::{ReminderKind, Subscription};
use tracing::{info, warn};

use crate::error::{BillingError, Result};
use crate::plans::Plan;

/// Something the user should hear about. Rendering is up to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A subscription became active after a payment.
    SubscriptionActivated {
        plan: String,
        expires_at: DateTime<Utc>,
    },
    /// An admin granted a subscription without payment.
    SubscriptionGranted {
        plan: String,
        expires_at: DateTime<Utc>,
    },
    ExpiryReminder {
        kind: ReminderKind,
        plan: String,
        expires_at: DateTime<Utc>,
    },
    AutoRenewDisabled {
        expires_at: DateTime<Utc>,
    },
    SubscriptionCancelled {
        expires_at: DateTime<Utc>,
    },
    PaymentRejected {
        payment_id: i64,
        reason: String,
    },
}

impl Notice {
    pub fn kind(&self) -> &'static str {
        match self {
            Notice::SubscriptionActivated { .. } => "subscription_activated",
            Notice::SubscriptionGranted { .. } => "subscription_granted",
            Notice::ExpiryReminder { .. } => "expiry_reminder",
            Notice::AutoRenewDisabled { .. } => "auto_renew_disabled",
            Notice::SubscriptionCancelled { .. } => "subscription_cancelled",
            Notice::PaymentRejected { .. } => "payment_rejected",
        }
    }
}

/// Channel that delivers notices to users.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, user_id: i64, notice: &Notice) -> Result<()>;
}

/// Channel that sends a renewal invoice on the card rail.
#[async_trait]
pub trait InvoiceSender: Send + Sync {
    async fn send_renewal_invoice(&self, subscription: &Subscription, plan: &Plan) -> Result<()>;
}

/// Deliver `notice`, logging instead of failing. Returns whether it went out.
pub(crate) async fn deliver(notifier: &dyn Notifier, user_id: i64, notice: &Notice) -> bool {
    match notifier.notify(user_id, notice).await {
        Ok(()) => true,
        Err(e) => {
            warn!(user_id, notice = notice.kind(), error = %e, "Failed to deliver notice");
            false
        }
    }
}

/// Discards every notice.
#[derive(Debug, Clone, Default)]
pub struct NoOpNotifier;

#[async_trait]
impl Notifier for NoOpNotifier {
    async fn notify(&self, _user_id: i64, _notice: &Notice) -> Result<()> {
        Ok(())
    }
}

/// Logs every notice and invoice instead of sending it.
#[derive(Debug, Clone, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn notify(&self, user_id: i64, notice: &Notice) -> Result<()> {
        info!(user_id, notice = ?notice, "Notice");
        Ok(())
    }
}

#[async_trait]
impl InvoiceSender for LoggingNotifier {
    async fn send_renewal_invoice(&self, subscription: &Subscription, plan: &Plan) -> Result<()> {
        info!(
            user_id = subscription.user_id,
            subscription_id = subscription.id,
            plan = plan.id,
            "Renewal invoice"
        );
        Ok(())
    }
}

/// Records notices and renewal invoices; users can be marked unreachable.
///
/// Clones share their records.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    notices: Arc<Mutex<Vec<(i64, Notice)>>>,
    invoices: Arc<Mutex<Vec<(i64, i64)>>>,
    unreachable: Arc<Mutex<HashSet<i64>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every delivery to `user_id` fail.
    pub fn fail_for(&self, user_id: i64) {
        lock(&self.unreachable).insert(user_id);
    }

    /// Delivered notices as `(user_id, notice)`.
    pub fn notices(&self) -> Vec<(i64, Notice)> {
        lock(&self.notices).clone()
    }

    pub fn notices_for(&self, user_id: i64) -> Vec<Notice> {
        lock(&self.notices)
            .iter()
            .filter(|(id, _)| *id == user_id)
            .map(|(_, notice)| notice.clone())
            .collect()
    }

    /// Sent renewal invoices as `(user_id, subscription_id)`.
    pub fn invoices(&self) -> Vec<(i64, i64)> {
        lock(&self.invoices).clone()
    }

    fn check_reachable(&self, user_id: i64) -> Result<()> {
        if lock(&self.unreachable).contains(&user_id) {
            return Err(BillingError::Delivery(format!("user {user_id} unreachable")));
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, user_id: i64, notice: &Notice) -> Result<()> {
        self.check_reachable(user_id)?;
        lock(&self.notices).push((user_id, notice.clone()));
        Ok(())
    }
}

#[async_trait]
impl InvoiceSender for RecordingNotifier {
    async fn send_renewal_invoice(&self, subscription: &Subscription, _plan: &Plan) -> Result<()> {
        self.check_reachable(subscription.user_id)?;
        lock(&self.invoices).push((subscription.user_id, subscription.id));
        Ok(())
    }
}
