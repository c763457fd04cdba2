//! Payment records and their status transitions.
//!
//! Status changes go through [`transition_payment`], a compare-and-swap on the
//! current status. Running it inside the same transaction as the subscription
//! insert guarantees a payment activates at most one subscription.

use chrono::{DateTime, Utc};
use sqlx::SqliteExecutor;

use crate::error::{DatabaseError, Result};
use crate::models::{Payment, PaymentStatus};

/// Fields for a new payment row.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub user_id: i64,
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub plan_type: String,
    pub tx_ref: Option<String>,
    pub invoice_ref: Option<String>,
    pub note: Option<String>,
}

/// A status change applied by [`transition_payment`].
///
/// `None` fields leave the stored value as is.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub to: PaymentStatus,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub confirmed_by: Option<i64>,
    pub tx_ref: Option<String>,
    pub note: Option<String>,
}

impl StatusChange {
    pub fn to(status: PaymentStatus) -> Self {
        Self {
            to: status,
            confirmed_at: None,
            confirmed_by: None,
            tx_ref: None,
            note: None,
        }
    }

    pub fn confirmed_at(mut self, at: DateTime<Utc>) -> Self {
        self.confirmed_at = Some(at);
        self
    }

    pub fn confirmed_by(mut self, admin_id: i64) -> Self {
        self.confirmed_by = Some(admin_id);
        self
    }

    pub fn tx_ref(mut self, tx_ref: impl Into<String>) -> Self {
        self.tx_ref = Some(tx_ref.into());
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

fn map_tx_ref_conflict(err: sqlx::Error, tx_ref: Option<&str>) -> DatabaseError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.is_unique_violation() {
            return DatabaseError::AlreadyExists {
                entity: "Payment reference",
                id: tx_ref.unwrap_or_default().to_string(),
            };
        }
    }
    DatabaseError::Sqlx(err)
}

/// Insert a payment and return the stored row.
pub async fn create_payment<'e, E>(
    executor: E,
    payment: &NewPayment,
    now: DateTime<Utc>,
) -> Result<Payment>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, Payment>(
        r#"
        INSERT INTO payments (user_id, amount_cents, currency, status, plan_type, tx_ref, invoice_ref, note, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING id, user_id, amount_cents, currency, status, plan_type, tx_ref, invoice_ref,
                  note, created_at, confirmed_at, confirmed_by
        "#,
    )
    .bind(payment.user_id)
    .bind(payment.amount_cents)
    .bind(&payment.currency)
    .bind(payment.status)
    .bind(&payment.plan_type)
    .bind(&payment.tx_ref)
    .bind(&payment.invoice_ref)
    .bind(&payment.note)
    .bind(now.timestamp())
    .fetch_one(executor)
    .await
    .map_err(|e| map_tx_ref_conflict(e, payment.tx_ref.as_deref()))
}

/// Get a payment by id.
pub async fn get_payment<'e, E>(executor: E, id: i64) -> Result<Payment>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, Payment>(
        r#"
        SELECT id, user_id, amount_cents, currency, status, plan_type, tx_ref, invoice_ref,
               note, created_at, confirmed_at, confirmed_by
        FROM payments
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(executor)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "Payment",
        id: id.to_string(),
    })
}

/// Payments in `status`, oldest first.
pub async fn list_payments_by_status<'e, E>(executor: E, status: PaymentStatus) -> Result<Vec<Payment>>
where
    E: SqliteExecutor<'e>,
{
    let payments = sqlx::query_as::<_, Payment>(
        r#"
        SELECT id, user_id, amount_cents, currency, status, plan_type, tx_ref, invoice_ref,
               note, created_at, confirmed_at, confirmed_by
        FROM payments
        WHERE status = ?
        ORDER BY created_at ASC, id ASC
        "#,
    )
    .bind(status)
    .fetch_all(executor)
    .await?;

    Ok(payments)
}

/// Find the payment settled by a blockchain hash or provider charge id.
pub async fn find_by_tx_ref<'e, E>(executor: E, tx_ref: &str) -> Result<Option<Payment>>
where
    E: SqliteExecutor<'e>,
{
    let payment = sqlx::query_as::<_, Payment>(
        r#"
        SELECT id, user_id, amount_cents, currency, status, plan_type, tx_ref, invoice_ref,
               note, created_at, confirmed_at, confirmed_by
        FROM payments
        WHERE tx_ref = ?
        "#,
    )
    .bind(tx_ref)
    .fetch_optional(executor)
    .await?;

    Ok(payment)
}

/// Move a payment from `from` to `change.to` if it is still in `from`.
///
/// Returns `false` when the payment was not in `from` (or does not exist);
/// nothing is written in that case.
pub async fn transition_payment<'e, E>(
    executor: E,
    id: i64,
    from: PaymentStatus,
    change: &StatusChange,
) -> Result<bool>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE payments
        SET status = ?,
            confirmed_at = COALESCE(?, confirmed_at),
            confirmed_by = COALESCE(?, confirmed_by),
            tx_ref = COALESCE(?, tx_ref),
            note = COALESCE(?, note)
        WHERE id = ? AND status = ?
        "#,
    )
    .bind(change.to)
    .bind(change.confirmed_at.map(|at| at.timestamp()))
    .bind(change.confirmed_by)
    .bind(&change.tx_ref)
    .bind(&change.note)
    .bind(id)
    .bind(from)
    .execute(executor)
    .await
    .map_err(|e| map_tx_ref_conflict(e, change.tx_ref.as_deref()))?;

    Ok(result.rows_affected() == 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{user, Database};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 1, 12, 0, 0).unwrap()
    }

    fn awaiting(user_id: i64, amount_cents: i64) -> NewPayment {
        NewPayment {
            user_id,
            amount_cents,
            currency: "USDT".to_string(),
            status: PaymentStatus::AwaitingConfirmation,
            plan_type: "monthly".to_string(),
            tx_ref: None,
            invoice_ref: None,
            note: None,
        }
    }

    async fn db() -> Database {
        let db = Database::connect_in_memory().await.unwrap();
        user::ensure_user(db.pool(), 1, t0()).await.unwrap();
        db
    }

    #[tokio::test]
    async fn pending_list_is_oldest_first() {
        let db = db().await;
        let later = create_payment(db.pool(), &awaiting(1, 2000), t0() + Duration::minutes(5))
            .await
            .unwrap();
        let earlier = create_payment(db.pool(), &awaiting(1, 16800), t0()).await.unwrap();

        let pending = list_payments_by_status(db.pool(), PaymentStatus::AwaitingConfirmation)
            .await
            .unwrap();
        let ids: Vec<i64> = pending.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![earlier.id, later.id]);
    }

    #[tokio::test]
    async fn transition_is_compare_and_swap() {
        let db = db().await;
        let payment = create_payment(db.pool(), &awaiting(1, 2000), t0()).await.unwrap();

        let change = StatusChange::to(PaymentStatus::Completed)
            .confirmed_at(t0())
            .confirmed_by(99)
            .note("Confirmed by admin");
        assert!(transition_payment(db.pool(), payment.id, PaymentStatus::AwaitingConfirmation, &change)
            .await
            .unwrap());
        assert!(!transition_payment(db.pool(), payment.id, PaymentStatus::AwaitingConfirmation, &change)
            .await
            .unwrap());

        let stored = get_payment(db.pool(), payment.id).await.unwrap();
        assert_eq!(stored.status, PaymentStatus::Completed);
        assert_eq!(stored.confirmed_by, Some(99));
        assert_eq!(stored.confirmed_at, Some(t0()));
        assert_eq!(stored.note.as_deref(), Some("Confirmed by admin"));
    }

    #[tokio::test]
    async fn tx_ref_settles_only_one_payment() {
        let db = db().await;
        let first = create_payment(db.pool(), &awaiting(1, 2000), t0()).await.unwrap();
        let second = create_payment(db.pool(), &awaiting(1, 2000), t0()).await.unwrap();

        let change = StatusChange::to(PaymentStatus::Completed).tx_ref("abc");
        assert!(transition_payment(db.pool(), first.id, PaymentStatus::AwaitingConfirmation, &change)
            .await
            .unwrap());
        let result =
            transition_payment(db.pool(), second.id, PaymentStatus::AwaitingConfirmation, &change).await;
        assert!(matches!(result, Err(DatabaseError::AlreadyExists { .. })));

        let found = find_by_tx_ref(db.pool(), "abc").await.unwrap().unwrap();
        assert_eq!(found.id, first.id);
        assert!(find_by_tx_ref(db.pool(), "zzz").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn invoice_ref_and_missing_payment() {
        let db = db().await;
        let invoiced = NewPayment {
            invoice_ref: Some("psy-1-monthly-0a1b2c3d".to_string()),
            ..awaiting(1, 2000)
        };
        let payment = create_payment(db.pool(), &invoiced, t0()).await.unwrap();
        let stored = get_payment(db.pool(), payment.id).await.unwrap();
        assert_eq!(stored.invoice_ref.as_deref(), Some("psy-1-monthly-0a1b2c3d"));

        assert!(matches!(
            get_payment(db.pool(), 404).await,
            Err(DatabaseError::NotFound { .. })
        ));
    }
}
