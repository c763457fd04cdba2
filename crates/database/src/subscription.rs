//! Subscription storage.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqliteExecutor};

use crate::error::{DatabaseError, Result};
use crate::models::Subscription;

/// Fields for a new subscription row.
#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub user_id: i64,
    pub plan_type: String,
    pub price_cents: i64,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub auto_renew: bool,
    pub payment_id: Option<i64>,
}

/// Expiry reminders, each tracked by its own flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReminderKind {
    ThreeDays,
    OneDay,
    Expired,
}

impl ReminderKind {
    pub const ALL: [ReminderKind; 3] = [
        ReminderKind::ThreeDays,
        ReminderKind::OneDay,
        ReminderKind::Expired,
    ];

    /// Days between the sweep and the expiry day this reminder targets.
    pub fn days_before_expiry(&self) -> i64 {
        match self {
            ReminderKind::ThreeDays => 3,
            ReminderKind::OneDay => 1,
            ReminderKind::Expired => 0,
        }
    }

    fn column(&self) -> &'static str {
        match self {
            ReminderKind::ThreeDays => "reminder_3_days_sent",
            ReminderKind::OneDay => "reminder_1_day_sent",
            ReminderKind::Expired => "reminder_expired_sent",
        }
    }
}

/// Deactivate any active subscription of the user and insert `new` as the active one.
///
/// Both statements run on `conn`; callers pass a transaction so the swap is atomic.
pub async fn replace_active_subscription(
    conn: &mut SqliteConnection,
    new: &NewSubscription,
    now: DateTime<Utc>,
) -> Result<Subscription> {
    let superseded = sqlx::query(
        r#"
        UPDATE subscriptions
        SET is_active = 0
        WHERE user_id = ? AND is_active = 1
        "#,
    )
    .bind(new.user_id)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if superseded > 0 {
        tracing::debug!(user_id = new.user_id, superseded, "Deactivated previous subscription");
    }

    let subscription = sqlx::query_as::<_, Subscription>(
        r#"
        INSERT INTO subscriptions (user_id, plan_type, price_cents, started_at, expires_at,
                                   is_active, auto_renew, payment_id, created_at)
        VALUES (?, ?, ?, ?, ?, 1, ?, ?, ?)
        RETURNING id, user_id, plan_type, price_cents, started_at, expires_at, is_active, auto_renew,
                  cancelled_at, cancel_reason, reminder_3_days_sent, reminder_1_day_sent,
                  reminder_expired_sent, auto_renew_invoice_sent, payment_id, created_at
        "#,
    )
    .bind(new.user_id)
    .bind(&new.plan_type)
    .bind(new.price_cents)
    .bind(new.started_at.timestamp())
    .bind(new.expires_at.timestamp())
    .bind(new.auto_renew)
    .bind(new.payment_id)
    .bind(now.timestamp())
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return DatabaseError::AlreadyExists {
                    entity: "Active subscription",
                    id: new.user_id.to_string(),
                };
            }
        }
        DatabaseError::Sqlx(e)
    })?;

    Ok(subscription)
}

/// The active subscription of a user, if any. It may already be past expiry.
pub async fn get_active_subscription<'e, E>(executor: E, user_id: i64) -> Result<Option<Subscription>>
where
    E: SqliteExecutor<'e>,
{
    let subscription = sqlx::query_as::<_, Subscription>(
        r#"
        SELECT id, user_id, plan_type, price_cents, started_at, expires_at, is_active, auto_renew,
               cancelled_at, cancel_reason, reminder_3_days_sent, reminder_1_day_sent,
               reminder_expired_sent, auto_renew_invoice_sent, payment_id, created_at
        FROM subscriptions
        WHERE user_id = ? AND is_active = 1
        ORDER BY expires_at DESC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .fetch_optional(executor)
    .await?;

    Ok(subscription)
}

/// Get a subscription by id.
pub async fn get_subscription<'e, E>(executor: E, id: i64) -> Result<Subscription>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, Subscription>(
        r#"
        SELECT id, user_id, plan_type, price_cents, started_at, expires_at, is_active, auto_renew,
               cancelled_at, cancel_reason, reminder_3_days_sent, reminder_1_day_sent,
               reminder_expired_sent, auto_renew_invoice_sent, payment_id, created_at
        FROM subscriptions
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(executor)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "Subscription",
        id: id.to_string(),
    })
}

/// Turn off auto-renewal. Expiry is untouched.
pub async fn disable_auto_renew<'e, E>(executor: E, id: i64) -> Result<()>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE subscriptions
        SET auto_renew = 0
        WHERE id = ?
        "#,
    )
    .bind(id)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "Subscription",
            id: id.to_string(),
        });
    }

    Ok(())
}

/// Turn off auto-renewal and record the cancellation. Expiry is untouched.
pub async fn cancel_subscription<'e, E>(
    executor: E,
    id: i64,
    at: DateTime<Utc>,
    reason: Option<&str>,
) -> Result<()>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE subscriptions
        SET auto_renew = 0,
            cancelled_at = ?,
            cancel_reason = ?
        WHERE id = ?
        "#,
    )
    .bind(at.timestamp())
    .bind(reason)
    .bind(id)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "Subscription",
            id: id.to_string(),
        });
    }

    Ok(())
}

/// Deactivate active subscriptions that expired before `cutoff`. Returns the count.
pub async fn deactivate_expired<'e, E>(executor: E, cutoff: DateTime<Utc>) -> Result<u64>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE subscriptions
        SET is_active = 0
        WHERE is_active = 1 AND expires_at < ?
        "#,
    )
    .bind(cutoff.timestamp())
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

/// Active subscriptions expiring within `[start, end]` whose `kind` reminder is unsent.
pub async fn due_reminders<'e, E>(
    executor: E,
    kind: ReminderKind,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<Subscription>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!(
        r#"
        SELECT id, user_id, plan_type, price_cents, started_at, expires_at, is_active, auto_renew,
               cancelled_at, cancel_reason, reminder_3_days_sent, reminder_1_day_sent,
               reminder_expired_sent, auto_renew_invoice_sent, payment_id, created_at
        FROM subscriptions
        WHERE is_active = 1
          AND {column} = 0
          AND expires_at >= ?
          AND expires_at <= ?
        ORDER BY expires_at ASC, id ASC
        "#,
        column = kind.column()
    );

    let subscriptions = sqlx::query_as::<_, Subscription>(&sql)
        .bind(start.timestamp())
        .bind(end.timestamp())
        .fetch_all(executor)
        .await?;

    Ok(subscriptions)
}

/// Record that the `kind` reminder was delivered.
pub async fn mark_reminder_sent<'e, E>(executor: E, id: i64, kind: ReminderKind) -> Result<()>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!(
        "UPDATE subscriptions SET {column} = 1 WHERE id = ?",
        column = kind.column()
    );
    sqlx::query(&sql).bind(id).execute(executor).await?;
    Ok(())
}

/// Active, auto-renewing, uncancelled subscriptions expiring within
/// `[start, end]` that have not been sent a renewal invoice.
pub async fn renewal_candidates<'e, E>(
    executor: E,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<Subscription>>
where
    E: SqliteExecutor<'e>,
{
    let subscriptions = sqlx::query_as::<_, Subscription>(
        r#"
        SELECT id, user_id, plan_type, price_cents, started_at, expires_at, is_active, auto_renew,
               cancelled_at, cancel_reason, reminder_3_days_sent, reminder_1_day_sent,
               reminder_expired_sent, auto_renew_invoice_sent, payment_id, created_at
        FROM subscriptions
        WHERE is_active = 1
          AND auto_renew = 1
          AND cancelled_at IS NULL
          AND auto_renew_invoice_sent = 0
          AND expires_at >= ?
          AND expires_at <= ?
        ORDER BY expires_at ASC, id ASC
        "#,
    )
    .bind(start.timestamp())
    .bind(end.timestamp())
    .fetch_all(executor)
    .await?;

    Ok(subscriptions)
}

/// Record that a renewal invoice was sent.
pub async fn mark_renewal_invoice_sent<'e, E>(executor: E, id: i64) -> Result<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        r#"
        UPDATE subscriptions
        SET auto_renew_invoice_sent = 1
        WHERE id = ?
        "#,
    )
    .bind(id)
    .execute(executor)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{user, Database};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 1, 12, 0, 0).unwrap()
    }

    fn monthly(user_id: i64, started_at: DateTime<Utc>) -> NewSubscription {
        NewSubscription {
            user_id,
            plan_type: "monthly".to_string(),
            price_cents: 2000,
            started_at,
            expires_at: started_at + Duration::days(30),
            auto_renew: true,
            payment_id: None,
        }
    }

    async fn db() -> Database {
        let db = Database::connect_in_memory().await.unwrap();
        user::ensure_user(db.pool(), 1, now()).await.unwrap();
        user::ensure_user(db.pool(), 2, now()).await.unwrap();
        db
    }

    #[tokio::test]
    async fn replace_supersedes_previous_active() {
        let db = db().await;
        let mut tx = db.pool().begin().await.unwrap();
        let first = replace_active_subscription(&mut tx, &monthly(1, now()), now())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let later = now() + Duration::days(2);
        let mut tx = db.pool().begin().await.unwrap();
        let second = replace_active_subscription(&mut tx, &monthly(1, later), later)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let active = get_active_subscription(db.pool(), 1).await.unwrap().unwrap();
        assert_eq!(active.id, second.id);
        assert!(!get_subscription(db.pool(), first.id).await.unwrap().is_active);
        assert!(get_active_subscription(db.pool(), 2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn second_active_row_is_rejected_by_index() {
        let db = db().await;
        let mut tx = db.pool().begin().await.unwrap();
        replace_active_subscription(&mut tx, &monthly(1, now()), now())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let raw = sqlx::query(
            "INSERT INTO subscriptions (user_id, plan_type, price_cents, started_at, expires_at, is_active, created_at)
             VALUES (1, 'monthly', 2000, 0, 0, 1, 0)",
        )
        .execute(db.pool())
        .await;
        assert!(raw.is_err());
    }

    #[tokio::test]
    async fn cancel_modes_leave_expiry_alone() {
        let db = db().await;
        let mut tx = db.pool().begin().await.unwrap();
        let sub = replace_active_subscription(&mut tx, &monthly(1, now()), now())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        disable_auto_renew(db.pool(), sub.id).await.unwrap();
        let stored = get_subscription(db.pool(), sub.id).await.unwrap();
        assert!(!stored.auto_renew);
        assert!(stored.cancelled_at.is_none());
        assert_eq!(stored.expires_at, sub.expires_at);

        cancel_subscription(db.pool(), sub.id, now(), Some("too expensive"))
            .await
            .unwrap();
        let stored = get_subscription(db.pool(), sub.id).await.unwrap();
        assert_eq!(stored.cancelled_at, Some(now()));
        assert_eq!(stored.cancel_reason.as_deref(), Some("too expensive"));
        assert!(stored.is_active);
        assert_eq!(stored.expires_at, sub.expires_at);
    }

    #[tokio::test]
    async fn reminders_and_renewals_filter_by_window_and_flag() {
        let db = db().await;
        let mut tx = db.pool().begin().await.unwrap();
        let sub = replace_active_subscription(&mut tx, &monthly(1, now() - Duration::days(27)), now())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let start = sub.expires_at - Duration::hours(1);
        let end = sub.expires_at + Duration::hours(1);
        let due = due_reminders(db.pool(), ReminderKind::ThreeDays, start, end)
            .await
            .unwrap();
        assert_eq!(due.len(), 1);

        mark_reminder_sent(db.pool(), sub.id, ReminderKind::ThreeDays)
            .await
            .unwrap();
        assert!(due_reminders(db.pool(), ReminderKind::ThreeDays, start, end)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            due_reminders(db.pool(), ReminderKind::OneDay, start, end)
                .await
                .unwrap()
                .len(),
            1
        );

        assert_eq!(renewal_candidates(db.pool(), start, end).await.unwrap().len(), 1);
        mark_renewal_invoice_sent(db.pool(), sub.id).await.unwrap();
        assert!(renewal_candidates(db.pool(), start, end).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn deactivate_expired_is_idempotent() {
        let db = db().await;
        let mut tx = db.pool().begin().await.unwrap();
        let sub = replace_active_subscription(&mut tx, &monthly(1, now() - Duration::days(40)), now())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(deactivate_expired(db.pool(), now()).await.unwrap(), 1);
        assert_eq!(deactivate_expired(db.pool(), now()).await.unwrap(), 0);
        assert!(!get_subscription(db.pool(), sub.id).await.unwrap().is_active);
    }
}
