//! Payment reconciliation: every confirmation source ends in the same
//! compare-and-swap on payment status, committed together with the
//! subscription it pays for.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use database::{
    payment, Database, NewPayment, Payment, PaymentStatus, StatusChange, Subscription,
};
use payment_rails::{
    cents_to_micro, generate_order_id, Invoice, InvoiceGateway, InvoiceStatus, Transfer,
};
use sqlx::SqliteConnection;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::{BillingError, Result};
use crate::lifecycle::activate;
use crate::notifier::{deliver, Notice, Notifier};
use crate::payload::ProviderPayload;
use crate::plans::Plan;

const STARS_CURRENCY: &str = "XTR";
const INVOICE_CURRENCY: &str = "USD";
const DEFAULT_REJECT_REASON: &str = "Rejected by admin";
const BLOCKCHAIN_NOTE: &str = "Auto-confirmed via blockchain";

/// Whether an on-chain amount pays `expected_cents`, within 1%.
pub fn amount_matches(expected_cents: i64, observed_micro: i64) -> bool {
    let expected = i128::from(cents_to_micro(expected_cents));
    if expected <= 0 {
        return false;
    }
    (i128::from(observed_micro) - expected).abs() * 100 <= expected
}

/// Bounded set of transfer hashes already handled by this process.
#[derive(Debug)]
pub struct SeenTransfers {
    hashes: HashSet<String>,
    order: VecDeque<String>,
    capacity: usize,
}

impl SeenTransfers {
    pub fn new(capacity: usize) -> Self {
        Self {
            hashes: HashSet::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.hashes.contains(hash)
    }

    pub fn insert(&mut self, hash: &str) {
        if !self.hashes.insert(hash.to_string()) {
            return;
        }
        self.order.push_back(hash.to_string());
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.hashes.remove(&evicted);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

impl Default for SeenTransfers {
    fn default() -> Self {
        Self::new(1000)
    }
}

/// A successful-payment event pushed by the payment provider.
#[derive(Debug, Clone)]
pub struct ProviderCompletion {
    /// Invoice payload, see [`ProviderPayload`].
    pub payload: String,
    /// Provider charge id, unique per charge.
    pub charge_id: String,
    /// Total in the smallest unit of `currency`.
    pub total_amount: i64,
    pub currency: String,
}

/// Result of handling a provider completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Activated {
        payment_id: i64,
        subscription: Subscription,
    },
    /// The charge was already recorded; nothing changed.
    Duplicate { payment_id: i64 },
}

/// Result of polling the gateway for one invoice payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvoiceCheck {
    Activated(Subscription),
    AlreadyCompleted,
    Failed,
    /// Not paid yet.
    Open(InvoiceStatus),
}

/// Opens payments and settles them from every confirmation source.
pub struct PaymentEngine {
    db: Database,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    gateway: Option<Arc<dyn InvoiceGateway>>,
    wallet_currency: String,
}

impl PaymentEngine {
    pub fn new(
        db: Database,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        wallet_currency: impl Into<String>,
    ) -> Self {
        Self {
            db,
            clock,
            notifier,
            gateway: None,
            wallet_currency: wallet_currency.into(),
        }
    }

    /// Enable hosted invoices.
    pub fn with_gateway(mut self, gateway: Arc<dyn InvoiceGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn has_gateway(&self) -> bool {
        self.gateway.is_some()
    }

    /// Open a crypto-rail payment awaiting confirmation for `plan_id`.
    pub async fn open_payment(&self, user_id: i64, plan_id: &str) -> Result<Payment> {
        let plan = Plan::require(plan_id)?;
        let payment = self
            .insert_awaiting(user_id, plan, &self.wallet_currency, None)
            .await?;
        info!(
            user_id,
            payment_id = payment.id,
            plan = plan.id,
            amount_cents = plan.price_cents,
            "Payment opened"
        );
        Ok(payment)
    }

    /// Open a payment backed by a hosted invoice. The gateway order id is
    /// kept as the payment's invoice reference.
    pub async fn open_invoice_payment(&self, user_id: i64, plan_id: &str) -> Result<(Payment, Invoice)> {
        let gateway = self.gateway()?;
        let plan = Plan::require(plan_id)?;
        let order_id = generate_order_id(user_id, plan.id);

        let invoice = gateway
            .create_invoice(&order_id, plan.price_cents, &plan.description())
            .await?;
        let payment = self
            .insert_awaiting(user_id, plan, INVOICE_CURRENCY, Some(order_id))
            .await?;

        info!(
            user_id,
            payment_id = payment.id,
            order_id = %invoice.order_id,
            gateway = gateway.name(),
            "Invoice payment opened"
        );
        Ok((payment, invoice))
    }

    /// Payments awaiting confirmation, oldest first.
    pub async fn list_pending(&self) -> Result<Vec<Payment>> {
        Ok(payment::list_payments_by_status(self.db.pool(), PaymentStatus::AwaitingConfirmation).await?)
    }

    pub async fn get_payment(&self, payment_id: i64) -> Result<Payment> {
        load_payment(self.db.pool(), payment_id).await
    }

    /// Admin confirmation.
    pub async fn confirm(&self, payment_id: i64, admin_id: i64) -> Result<Subscription> {
        let change = StatusChange::to(PaymentStatus::Completed)
            .confirmed_at(self.clock.now())
            .confirmed_by(admin_id);
        let (_, subscription) = self.settle(payment_id, &change, None).await?;
        info!(payment_id, admin_id, "Payment confirmed by admin");
        Ok(subscription)
    }

    /// Admin rejection. The user is told why.
    pub async fn cancel_payment(
        &self,
        payment_id: i64,
        admin_id: i64,
        reason: Option<&str>,
    ) -> Result<Payment> {
        let reason = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_REJECT_REASON);
        let cancelled = self.cancel_awaiting(payment_id, None, reason).await?;

        info!(payment_id, admin_id, reason, "Payment rejected");
        deliver(
            self.notifier.as_ref(),
            cancelled.user_id,
            &Notice::PaymentRejected {
                payment_id,
                reason: reason.to_string(),
            },
        )
        .await;
        Ok(cancelled)
    }

    /// The owner withdraws a payment they opened.
    pub async fn self_cancel(&self, payment_id: i64, user_id: i64) -> Result<Payment> {
        let cancelled = self
            .cancel_awaiting(payment_id, Some(user_id), "Cancelled by user")
            .await?;
        info!(payment_id, user_id, "Payment cancelled by user");
        Ok(cancelled)
    }

    /// Pre-authorization: accept the payload only if completing it could succeed.
    pub async fn validate_pre_checkout(&self, payload: &str) -> Result<ProviderPayload> {
        let parsed: ProviderPayload = payload.parse()?;
        if let Some(payment_id) = parsed.payment_id {
            let existing = load_payment(self.db.pool(), payment_id).await?;
            if existing.user_id != parsed.user_id {
                return Err(BillingError::NotOwner {
                    payment_id,
                    user_id: parsed.user_id,
                });
            }
            if existing.status != PaymentStatus::AwaitingConfirmation {
                return Err(BillingError::WrongStatus {
                    id: payment_id,
                    actual: existing.status,
                    expected: PaymentStatus::AwaitingConfirmation,
                });
            }
        }
        Ok(parsed)
    }

    /// Provider push event: record the charge and activate. A repeated
    /// charge id is reported as a duplicate instead of activating twice.
    pub async fn complete_provider_payment(&self, event: &ProviderCompletion) -> Result<Completion> {
        let payload: ProviderPayload = event.payload.parse()?;
        let charge_id = event.charge_id.trim();
        if charge_id.is_empty() {
            return Err(BillingError::InvalidPayload("missing charge id".to_string()));
        }

        let pool = self.db.pool();
        if let Some(existing) = payment::find_by_tx_ref(pool, charge_id).await? {
            info!(payment_id = existing.id, charge_id, "Duplicate provider completion");
            return Ok(Completion::Duplicate {
                payment_id: existing.id,
            });
        }

        let note = if event.currency == STARS_CURRENCY {
            format!("Paid via Telegram Stars ({} XTR)", event.total_amount)
        } else {
            "Paid via Telegram Payments (card)".to_string()
        };
        let change = StatusChange::to(PaymentStatus::Completed)
            .confirmed_at(self.clock.now())
            .tx_ref(charge_id)
            .note(note);

        let settled = match payload.payment_id {
            Some(payment_id) => self.settle(payment_id, &change, Some(payload.user_id)).await,
            None => self.settle_new(&payload, &change).await,
        };

        match settled {
            Ok((paid, subscription)) => {
                info!(
                    user_id = payload.user_id,
                    payment_id = paid.id,
                    kind = payload.kind.as_str(),
                    "Provider payment completed"
                );
                Ok(Completion::Activated {
                    payment_id: paid.id,
                    subscription,
                })
            }
            Err(BillingError::Database(e)) if e.is_already_exists() => {
                match payment::find_by_tx_ref(pool, charge_id).await? {
                    Some(existing) => Ok(Completion::Duplicate {
                        payment_id: existing.id,
                    }),
                    None => Err(BillingError::Database(e)),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Ask the gateway about one invoice payment and settle it if paid.
    pub async fn check_invoice(&self, payment_id: i64) -> Result<InvoiceCheck> {
        let gateway = self.gateway()?;
        let existing = load_payment(self.db.pool(), payment_id).await?;
        let order_id = existing.invoice_ref.clone().ok_or_else(|| {
            BillingError::InvalidPayload(format!("payment {payment_id} has no invoice"))
        })?;

        match existing.status {
            PaymentStatus::Completed => return Ok(InvoiceCheck::AlreadyCompleted),
            PaymentStatus::AwaitingConfirmation => {}
            actual => {
                return Err(BillingError::WrongStatus {
                    id: payment_id,
                    actual,
                    expected: PaymentStatus::AwaitingConfirmation,
                })
            }
        }

        let status = gateway.invoice_status(&order_id).await?;
        debug!(payment_id, order_id = %order_id, ?status, "Invoice status");

        match status {
            InvoiceStatus::Paid => {
                let change = StatusChange::to(PaymentStatus::Completed)
                    .confirmed_at(self.clock.now())
                    .note(format!("Paid via {}", gateway.name()));
                match self.settle(payment_id, &change, None).await {
                    Ok((_, subscription)) => Ok(InvoiceCheck::Activated(subscription)),
                    Err(BillingError::WrongStatus {
                        actual: PaymentStatus::Completed,
                        ..
                    }) => Ok(InvoiceCheck::AlreadyCompleted),
                    Err(e) => Err(e),
                }
            }
            InvoiceStatus::Failed => {
                let change = StatusChange::to(PaymentStatus::Failed)
                    .note(format!("Invoice failed at {}", gateway.name()));
                let mut tx = self.db.begin_write().await?;
                let current = load_payment(&mut *tx, payment_id).await?;
                match advance(&mut tx, &current, &change).await {
                    Ok(_) => {
                        tx.commit().await?;
                        warn!(payment_id, order_id = %order_id, "Invoice failed");
                        Ok(InvoiceCheck::Failed)
                    }
                    Err(BillingError::WrongStatus {
                        actual: PaymentStatus::Completed,
                        ..
                    }) => Ok(InvoiceCheck::AlreadyCompleted),
                    Err(e) => Err(e),
                }
            }
            open => Ok(InvoiceCheck::Open(open)),
        }
    }

    /// Poll every open invoice payment. Returns how many were activated.
    pub async fn check_open_invoices(&self) -> Result<usize> {
        if self.gateway.is_none() {
            return Ok(0);
        }
        let mut activated = 0;
        for open in self.list_pending().await? {
            if open.invoice_ref.is_none() {
                continue;
            }
            match self.check_invoice(open.id).await {
                Ok(InvoiceCheck::Activated(_)) => activated += 1,
                Ok(_) => {}
                Err(e) => warn!(payment_id = open.id, error = %e, "Invoice check failed"),
            }
        }
        Ok(activated)
    }

    /// Match inbound transfers against payments awaiting confirmation.
    ///
    /// Transfers are taken oldest first; each claims the oldest open payment
    /// whose amount it matches and which it does not predate. Returns the
    /// number of payments confirmed.
    pub async fn process_transfers(
        &self,
        transfers: &[Transfer],
        seen: &mut SeenTransfers,
    ) -> Result<usize> {
        let mut fresh: Vec<&Transfer> = transfers.iter().filter(|t| !seen.contains(&t.hash)).collect();
        if fresh.is_empty() {
            return Ok(0);
        }
        fresh.sort_by_key(|t| t.received_at);

        let pool = self.db.pool();
        let mut candidates: Vec<Payment> = self
            .list_pending()
            .await?
            .into_iter()
            .filter(|p| p.invoice_ref.is_none() && p.currency == self.wallet_currency)
            .collect();
        let mut confirmed = 0;

        for transfer in fresh {
            if payment::find_by_tx_ref(pool, &transfer.hash).await?.is_some() {
                seen.insert(&transfer.hash);
                continue;
            }

            let Some(index) = candidates
                .iter()
                .position(|p| claims(transfer, p.created_at, p.amount_cents))
            else {
                debug!(hash = %transfer.hash, amount_micro = transfer.amount_micro, "Transfer matches no payment");
                seen.insert(&transfer.hash);
                continue;
            };
            let matched = candidates.remove(index);

            let change = StatusChange::to(PaymentStatus::Completed)
                .confirmed_at(self.clock.now())
                .tx_ref(transfer.hash.as_str())
                .note(BLOCKCHAIN_NOTE);
            match self.settle(matched.id, &change, None).await {
                Ok(_) => {
                    info!(
                        payment_id = matched.id,
                        user_id = matched.user_id,
                        hash = %transfer.hash,
                        "Payment confirmed from blockchain"
                    );
                    seen.insert(&transfer.hash);
                    confirmed += 1;
                }
                Err(BillingError::Database(e)) if e.is_already_exists() => {
                    seen.insert(&transfer.hash);
                }
                Err(e @ BillingError::WrongStatus { .. }) => {
                    warn!(payment_id = matched.id, error = %e, "Payment settled elsewhere, leaving transfer for the next poll");
                }
                Err(e) => {
                    warn!(payment_id = matched.id, hash = %transfer.hash, error = %e, "Failed to settle transfer");
                }
            }
        }

        Ok(confirmed)
    }

    fn gateway(&self) -> Result<&Arc<dyn InvoiceGateway>> {
        self.gateway
            .as_ref()
            .ok_or_else(|| BillingError::NotConfigured("invoice gateway".to_string()))
    }

    async fn insert_awaiting(
        &self,
        user_id: i64,
        plan: &Plan,
        currency: &str,
        invoice_ref: Option<String>,
    ) -> Result<Payment> {
        let now = self.clock.now();
        let mut tx = self.db.begin_write().await?;
        database::user::ensure_user(&mut *tx, user_id, now).await?;
        let opened = payment::create_payment(
            &mut *tx,
            &awaiting(user_id, plan, currency, invoice_ref),
            now,
        )
        .await?;
        tx.commit().await?;
        Ok(opened)
    }

    /// Complete an existing payment and activate its plan in one transaction.
    /// Returns the stored, completed payment.
    async fn settle(
        &self,
        payment_id: i64,
        change: &StatusChange,
        owner: Option<i64>,
    ) -> Result<(Payment, Subscription)> {
        let now = self.clock.now();
        let mut tx = self.db.begin_write().await?;
        let existing = load_payment(&mut *tx, payment_id).await?;
        if let Some(user_id) = owner {
            if existing.user_id != user_id {
                return Err(BillingError::NotOwner { payment_id, user_id });
            }
        }
        let (paid, subscription) = settle_in(&mut tx, &existing, change, now).await?;
        tx.commit().await?;

        self.announce(&paid, &subscription).await;
        Ok((paid, subscription))
    }

    /// Record a provider charge that has no payment yet, and activate.
    async fn settle_new(
        &self,
        payload: &ProviderPayload,
        change: &StatusChange,
    ) -> Result<(Payment, Subscription)> {
        let now = self.clock.now();
        let mut tx = self.db.begin_write().await?;
        database::user::ensure_user(&mut *tx, payload.user_id, now).await?;
        let opened = payment::create_payment(
            &mut *tx,
            &awaiting(payload.user_id, payload.plan, INVOICE_CURRENCY, None),
            now,
        )
        .await?;
        let (paid, subscription) = settle_in(&mut tx, &opened, change, now).await?;
        tx.commit().await?;

        self.announce(&paid, &subscription).await;
        Ok((paid, subscription))
    }

    async fn announce(&self, paid: &Payment, subscription: &Subscription) {
        deliver(
            self.notifier.as_ref(),
            paid.user_id,
            &Notice::SubscriptionActivated {
                plan: subscription.plan_type.clone(),
                expires_at: subscription.expires_at,
            },
        )
        .await;
    }

    async fn cancel_awaiting(&self, payment_id: i64, owner: Option<i64>, note: &str) -> Result<Payment> {
        let mut tx = self.db.begin_write().await?;
        let existing = load_payment(&mut *tx, payment_id).await?;
        if let Some(user_id) = owner {
            if existing.user_id != user_id {
                return Err(BillingError::NotOwner { payment_id, user_id });
            }
        }

        let change = StatusChange::to(PaymentStatus::Cancelled).note(note);
        let cancelled = advance(&mut tx, &existing, &change).await?;
        tx.commit().await?;
        Ok(cancelled)
    }
}

fn awaiting(user_id: i64, plan: &Plan, currency: &str, invoice_ref: Option<String>) -> NewPayment {
    NewPayment {
        user_id,
        amount_cents: plan.price_cents,
        currency: currency.to_string(),
        status: PaymentStatus::AwaitingConfirmation,
        plan_type: plan.id.to_string(),
        tx_ref: None,
        invoice_ref,
        note: None,
    }
}

fn claims(transfer: &Transfer, opened_at: DateTime<Utc>, amount_cents: i64) -> bool {
    transfer.received_at >= opened_at && amount_matches(amount_cents, transfer.amount_micro)
}

async fn load_payment<'e, E>(executor: E, payment_id: i64) -> Result<Payment>
where
    E: sqlx::SqliteExecutor<'e>,
{
    match payment::get_payment(executor, payment_id).await {
        Ok(found) => Ok(found),
        Err(e) if e.is_not_found() => Err(BillingError::PaymentNotFound(payment_id)),
        Err(e) => Err(e.into()),
    }
}

/// Move `payment` out of awaiting confirmation with a compare-and-swap.
/// Returns the stored row after the move.
async fn advance(
    conn: &mut SqliteConnection,
    payment: &Payment,
    change: &StatusChange,
) -> Result<Payment> {
    let moved = payment.status.can_transition_to(change.to)
        && payment::transition_payment(&mut *conn, payment.id, payment.status, change).await?;
    if !moved {
        let actual = load_payment(&mut *conn, payment.id).await?.status;
        return Err(BillingError::WrongStatus {
            id: payment.id,
            actual,
            expected: PaymentStatus::AwaitingConfirmation,
        });
    }
    load_payment(&mut *conn, payment.id).await
}

/// Complete `payment` and activate its plan, on the caller's transaction.
async fn settle_in(
    conn: &mut SqliteConnection,
    payment: &Payment,
    change: &StatusChange,
    now: DateTime<Utc>,
) -> Result<(Payment, Subscription)> {
    let plan = Plan::require(&payment.plan_type)?;
    let paid = advance(&mut *conn, payment, change).await?;
    let subscription = activate(conn, paid.user_id, plan, Some(paid.id), now).await?;
    Ok((paid, subscription))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_tolerance_is_one_percent() {
        // $20.00 = 20_000_000 micro
        assert!(amount_matches(2000, 20_000_000));
        assert!(amount_matches(2000, 19_800_000));
        assert!(amount_matches(2000, 20_200_000));
        assert!(!amount_matches(2000, 19_799_999));
        assert!(!amount_matches(2000, 20_200_001));
        assert!(!amount_matches(0, 0));
    }

    #[test]
    fn seen_transfers_are_bounded() {
        let mut seen = SeenTransfers::new(2);
        seen.insert("a");
        seen.insert("b");
        seen.insert("b");
        assert_eq!(seen.len(), 2);
        seen.insert("c");
        assert!(!seen.contains("a"));
        assert!(seen.contains("b") && seen.contains("c"));
    }

    #[tokio::test]
    async fn settle_hands_back_the_completed_row() {
        use crate::clock::ManualClock;
        use crate::notifier::NoOpNotifier;
        use chrono::TimeZone;

        let db = Database::connect_in_memory().await.unwrap();
        let now = Utc.with_ymd_and_hms(2025, 5, 1, 10, 0, 0).unwrap();
        let engine = PaymentEngine::new(db, Arc::new(ManualClock::new(now)), Arc::new(NoOpNotifier), "USDT");
        let opened = engine.open_payment(3, "monthly").await.unwrap();

        let change = StatusChange::to(PaymentStatus::Completed)
            .confirmed_at(now)
            .confirmed_by(99);
        let (paid, subscription) = engine.settle(opened.id, &change, Some(3)).await.unwrap();
        assert_eq!(paid.id, opened.id);
        assert_eq!(paid.status, PaymentStatus::Completed);
        assert_eq!(paid.confirmed_by, Some(99));
        assert_eq!(subscription.payment_id, Some(opened.id));

        let again = engine.settle(opened.id, &change, Some(3)).await.unwrap_err();
        assert!(matches!(
            again,
            BillingError::WrongStatus {
                actual: PaymentStatus::Completed,
                ..
            }
        ));
    }
}
