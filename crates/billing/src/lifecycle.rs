//! Subscription lifecycle: activation, cancellation and the expiry sweeps.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use database::{subscription, user, Database, NewSubscription, ReminderKind, Subscription};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{debug, error, info, warn};

use crate::clock::{day_window, Clock};
use crate::error::{BillingError, Result};
use crate::notifier::{deliver, InvoiceSender, Notice, Notifier};
use crate::plans::Plan;

/// How far a cancellation goes. Neither mode touches the expiry date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelMode {
    /// Stop renewing; access runs to expiry.
    AutoRenewOff,
    /// Stop renewing and record the cancellation.
    Full,
}

/// Make `plan` the user's active subscription, starting at `now`.
///
/// Runs on the caller's connection so it can share a transaction with the
/// payment status change that paid for it.
pub(crate) async fn activate(
    conn: &mut SqliteConnection,
    user_id: i64,
    plan: &Plan,
    payment_id: Option<i64>,
    now: DateTime<Utc>,
) -> Result<Subscription> {
    user::ensure_user(&mut *conn, user_id, now).await?;
    let new = NewSubscription {
        user_id,
        plan_type: plan.id.to_string(),
        price_cents: plan.price_cents,
        started_at: now,
        expires_at: now + plan.duration(),
        auto_renew: true,
        payment_id,
    };
    Ok(subscription::replace_active_subscription(conn, &new, now).await?)
}

/// Creates, cancels and sweeps subscriptions.
pub struct SubscriptionManager {
    db: Database,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    invoices: Option<Arc<dyn InvoiceSender>>,
    grace_period_days: i64,
}

impl SubscriptionManager {
    pub fn new(
        db: Database,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        grace_period_days: i64,
    ) -> Self {
        Self {
            db,
            clock,
            notifier,
            invoices: None,
            grace_period_days,
        }
    }

    /// Enable renewal invoices on the card rail.
    pub fn with_invoice_sender(mut self, invoices: Arc<dyn InvoiceSender>) -> Self {
        self.invoices = Some(invoices);
        self
    }

    /// Create the user's subscription to `plan_id`, replacing any active one.
    pub async fn create_subscription(
        &self,
        user_id: i64,
        plan_id: &str,
        payment_id: Option<i64>,
    ) -> Result<Subscription> {
        let plan = Plan::require(plan_id)?;
        let now = self.clock.now();

        let mut tx = self.db.begin_write().await?;
        let created = activate(&mut tx, user_id, plan, payment_id, now).await?;
        tx.commit().await?;

        info!(
            user_id,
            subscription_id = created.id,
            plan = plan.id,
            expires_at = %created.expires_at,
            "Subscription created"
        );
        deliver(
            self.notifier.as_ref(),
            user_id,
            &Notice::SubscriptionActivated {
                plan: created.plan_type.clone(),
                expires_at: created.expires_at,
            },
        )
        .await;
        Ok(created)
    }

    /// Admin grant: a subscription with no payment behind it.
    pub async fn grant(&self, user_id: i64, plan_id: &str, admin_id: i64) -> Result<Subscription> {
        let plan = Plan::require(plan_id)?;
        let now = self.clock.now();

        let mut tx = self.db.begin_write().await?;
        let granted = activate(&mut tx, user_id, plan, None, now).await?;
        tx.commit().await?;

        info!(
            user_id,
            admin_id,
            subscription_id = granted.id,
            plan = plan.id,
            "Subscription granted"
        );
        deliver(
            self.notifier.as_ref(),
            user_id,
            &Notice::SubscriptionGranted {
                plan: granted.plan_type.clone(),
                expires_at: granted.expires_at,
            },
        )
        .await;
        Ok(granted)
    }

    /// Cancel the user's active subscription.
    pub async fn cancel(
        &self,
        user_id: i64,
        mode: CancelMode,
        reason: Option<&str>,
    ) -> Result<Subscription> {
        let pool = self.db.pool();
        let active = subscription::get_active_subscription(pool, user_id)
            .await?
            .ok_or(BillingError::NoActiveSubscription(user_id))?;

        let notice = match mode {
            CancelMode::AutoRenewOff => {
                subscription::disable_auto_renew(pool, active.id).await?;
                Notice::AutoRenewDisabled {
                    expires_at: active.expires_at,
                }
            }
            CancelMode::Full => {
                subscription::cancel_subscription(pool, active.id, self.clock.now(), reason).await?;
                Notice::SubscriptionCancelled {
                    expires_at: active.expires_at,
                }
            }
        };

        info!(user_id, subscription_id = active.id, ?mode, "Subscription cancelled");
        deliver(self.notifier.as_ref(), user_id, &notice).await;
        Ok(subscription::get_subscription(pool, active.id).await?)
    }

    /// Deactivate subscriptions past expiry plus grace. Idempotent.
    pub async fn sweep_expirations(&self) -> Result<u64> {
        let cutoff = self.clock.now() - Duration::days(self.grace_period_days);
        let deactivated = subscription::deactivate_expired(self.db.pool(), cutoff).await?;
        if deactivated > 0 {
            info!(deactivated, "Deactivated expired subscriptions");
        }
        Ok(deactivated)
    }

    /// Send the 3-day, 1-day and expiry-day reminders that are due.
    ///
    /// A reminder is flagged only once delivered; a failed user is retried
    /// on the next sweep that still falls inside its day window.
    pub async fn sweep_reminders(&self) -> Result<usize> {
        let now = self.clock.now();
        let pool = self.db.pool();
        let mut sent = 0;

        for kind in ReminderKind::ALL {
            let day = (now + Duration::days(kind.days_before_expiry())).date_naive();
            let (start, end) = day_window(day);
            let due = subscription::due_reminders(pool, kind, start, end).await?;
            if due.is_empty() {
                continue;
            }
            debug!(?kind, count = due.len(), "Reminders due");

            for sub in due {
                let notice = Notice::ExpiryReminder {
                    kind,
                    plan: sub.plan_type.clone(),
                    expires_at: sub.expires_at,
                };
                if !deliver(self.notifier.as_ref(), sub.user_id, &notice).await {
                    continue;
                }
                match subscription::mark_reminder_sent(pool, sub.id, kind).await {
                    Ok(()) => sent += 1,
                    Err(e) => error!(
                        subscription_id = sub.id,
                        ?kind,
                        error = %e,
                        "Failed to flag reminder"
                    ),
                }
            }
        }

        if sent > 0 {
            info!(sent, "Expiry reminders sent");
        }
        Ok(sent)
    }

    /// Send renewal invoices for auto-renewing subscriptions expiring tomorrow.
    pub async fn sweep_auto_renew_invoices(&self) -> Result<usize> {
        let Some(invoices) = &self.invoices else {
            debug!("Card rail not configured, skipping renewal invoices");
            return Ok(0);
        };

        let tomorrow = (self.clock.now() + Duration::days(1)).date_naive();
        let (start, end) = day_window(tomorrow);
        let pool = self.db.pool();
        let mut sent = 0;

        for sub in subscription::renewal_candidates(pool, start, end).await? {
            let Some(plan) = Plan::find(&sub.plan_type) else {
                warn!(subscription_id = sub.id, plan = %sub.plan_type, "Unknown plan, no renewal invoice");
                continue;
            };
            if let Err(e) = invoices.send_renewal_invoice(&sub, plan).await {
                warn!(user_id = sub.user_id, subscription_id = sub.id, error = %e, "Failed to send renewal invoice");
                continue;
            }
            match subscription::mark_renewal_invoice_sent(pool, sub.id).await {
                Ok(()) => sent += 1,
                Err(e) => error!(subscription_id = sub.id, error = %e, "Failed to flag renewal invoice"),
            }
        }

        if sent > 0 {
            info!(sent, "Renewal invoices sent");
        }
        Ok(sent)
    }
}
