//! Who may send a message right now, and on what terms.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use database::{subscription, user, Database, Subscription, User};
use serde::Serialize;
use tracing::debug;

use crate::clock::Clock;
use crate::config::BillingConfig;
use crate::error::Result;

/// Entitlement state of a user at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Entitlement {
    /// No usable subscription, free messages left today.
    FreeActive { remaining: i64 },
    /// No usable subscription, free messages used up today.
    FreeExhausted,
    /// Subscription expired within the grace period.
    Grace { expires_at: DateTime<Utc> },
    Subscribed { expires_at: DateTime<Utc> },
}

impl Entitlement {
    /// Paid access, so the free counter is not involved.
    pub fn is_paid(&self) -> bool {
        matches!(self, Entitlement::Grace { .. } | Entitlement::Subscribed { .. })
    }
}

/// Evaluate a user's entitlement. Pure: reads nothing, writes nothing.
///
/// `subscription` is the user's active row, if any. A free counter stamped
/// with an earlier day counts as zero.
pub fn evaluate(
    user: &User,
    subscription: Option<&Subscription>,
    now: DateTime<Utc>,
    free_daily_messages: i64,
    grace_period_days: i64,
) -> Entitlement {
    if let Some(sub) = subscription.filter(|s| s.is_active) {
        if !sub.is_expired(now) {
            return Entitlement::Subscribed {
                expires_at: sub.expires_at,
            };
        }
        if now <= sub.expires_at + Duration::days(grace_period_days) {
            return Entitlement::Grace {
                expires_at: sub.expires_at,
            };
        }
    }

    let used = user.free_messages_used_on(now.date_naive());
    let remaining = (free_daily_messages - used).max(0);
    if remaining > 0 {
        Entitlement::FreeActive { remaining }
    } else {
        Entitlement::FreeExhausted
    }
}

/// Outcome of gating one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Paid access (subscribed or in grace).
    Entitled(Entitlement),
    /// Admin identity, never counted.
    Privileged,
    /// A free message was consumed; `remaining` are left today.
    Free { remaining: i64 },
    /// Daily free limit reached; nothing was consumed.
    Exhausted { limit: i64 },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        !matches!(self, Admission::Exhausted { .. })
    }
}

/// Subscription part of a [`StatusView`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionStatus {
    pub id: i64,
    pub plan: String,
    pub expires_at: DateTime<Utc>,
    pub days_remaining: i64,
    pub auto_renew: bool,
    pub cancelled: bool,
}

/// What a user sees when asking for their status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusView {
    pub user_id: i64,
    pub entitlement: Entitlement,
    pub subscription: Option<SubscriptionStatus>,
    /// Free messages left today; the full limit while paid access lasts.
    pub free_messages_remaining: i64,
    pub free_daily_messages: i64,
}

/// Entitlement checks against the store.
pub struct EntitlementService {
    db: Database,
    clock: Arc<dyn Clock>,
    free_daily_messages: i64,
    grace_period_days: i64,
    admin_user_id: Option<i64>,
}

impl EntitlementService {
    pub fn new(db: Database, clock: Arc<dyn Clock>, config: &BillingConfig) -> Self {
        Self {
            db,
            clock,
            free_daily_messages: config.free_daily_messages,
            grace_period_days: config.grace_period_days,
            admin_user_id: config.admin_user_id,
        }
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_user_id == Some(user_id)
    }

    /// Current entitlement. Unknown users are treated as fresh free users.
    pub async fn evaluate(&self, user_id: i64) -> Result<Entitlement> {
        let now = self.clock.now();
        let (user, subscription) = self.load(user_id, now).await?;
        Ok(evaluate(
            &user,
            subscription.as_ref(),
            now,
            self.free_daily_messages,
            self.grace_period_days,
        ))
    }

    /// Gate one inbound message.
    ///
    /// The free counter moves by exactly one when the message is admitted on
    /// the free tier, and not at all otherwise. The check and the increment
    /// are a single statement, so concurrent messages cannot overshoot.
    pub async fn admit(&self, user_id: i64) -> Result<Admission> {
        if self.is_admin(user_id) {
            return Ok(Admission::Privileged);
        }

        let now = self.clock.now();
        let entitlement = self.evaluate(user_id).await?;
        if entitlement.is_paid() {
            return Ok(Admission::Entitled(entitlement));
        }

        let today = now.date_naive();
        let pool = self.db.pool();
        user::ensure_user(pool, user_id, now).await?;
        if !user::consume_free_message(pool, user_id, today, self.free_daily_messages).await? {
            debug!(user_id, "Free tier exhausted");
            return Ok(Admission::Exhausted {
                limit: self.free_daily_messages,
            });
        }

        let used = user::get_user(pool, user_id).await?.free_messages_used_on(today);
        let remaining = (self.free_daily_messages - used).max(0);
        debug!(user_id, remaining, "Free message consumed");
        Ok(Admission::Free { remaining })
    }

    /// Subscription, days left and free allowance for one user.
    pub async fn status(&self, user_id: i64) -> Result<StatusView> {
        let now = self.clock.now();
        let (user, subscription) = self.load(user_id, now).await?;
        let entitlement = evaluate(
            &user,
            subscription.as_ref(),
            now,
            self.free_daily_messages,
            self.grace_period_days,
        );
        let free_messages_remaining = match entitlement {
            Entitlement::FreeActive { remaining } => remaining,
            Entitlement::FreeExhausted => 0,
            Entitlement::Grace { .. } | Entitlement::Subscribed { .. } => {
                (self.free_daily_messages - user.free_messages_used_on(now.date_naive())).max(0)
            }
        };

        Ok(StatusView {
            user_id,
            entitlement,
            subscription: subscription.map(|sub| SubscriptionStatus {
                id: sub.id,
                days_remaining: sub.days_remaining(now),
                plan: sub.plan_type,
                expires_at: sub.expires_at,
                auto_renew: sub.auto_renew,
                cancelled: sub.cancelled_at.is_some(),
            }),
            free_messages_remaining,
            free_daily_messages: self.free_daily_messages,
        })
    }

    async fn load(&self, user_id: i64, now: DateTime<Utc>) -> Result<(User, Option<Subscription>)> {
        let pool = self.db.pool();
        let user = match user::get_user(pool, user_id).await {
            Ok(user) => user,
            Err(e) if e.is_not_found() => User {
                user_id,
                username: None,
                first_name: None,
                language_code: user::DEFAULT_LANGUAGE.to_string(),
                created_at: now,
                last_interaction: now,
                free_messages_today: 0,
                free_messages_reset_date: None,
            },
            Err(e) => return Err(e.into()),
        };
        let subscription = subscription::get_active_subscription(pool, user_id).await?;
        Ok((user, subscription))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{NaiveDate, TimeZone};
    use database::NewSubscription;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
    }

    fn user(used: i64, on: Option<NaiveDate>) -> User {
        User {
            user_id: 1,
            username: None,
            first_name: None,
            language_code: "ru".into(),
            created_at: now(),
            last_interaction: now(),
            free_messages_today: used,
            free_messages_reset_date: on,
        }
    }

    fn subscription(expires_at: DateTime<Utc>, is_active: bool) -> Subscription {
        Subscription {
            id: 1,
            user_id: 1,
            plan_type: "monthly".into(),
            price_cents: 2000,
            started_at: expires_at - Duration::days(30),
            expires_at,
            is_active,
            auto_renew: true,
            cancelled_at: None,
            cancel_reason: None,
            reminder_3_days_sent: false,
            reminder_1_day_sent: false,
            reminder_expired_sent: false,
            auto_renew_invoice_sent: false,
            payment_id: None,
            created_at: expires_at - Duration::days(30),
        }
    }

    #[test]
    fn evaluate_free_tier() {
        let today = now().date_naive();
        assert_eq!(
            evaluate(&user(0, None), None, now(), 3, 3),
            Entitlement::FreeActive { remaining: 3 }
        );
        assert_eq!(
            evaluate(&user(2, Some(today)), None, now(), 3, 3),
            Entitlement::FreeActive { remaining: 1 }
        );
        assert_eq!(
            evaluate(&user(3, Some(today)), None, now(), 3, 3),
            Entitlement::FreeExhausted
        );
        // Yesterday's counter is stale.
        let yesterday = today.pred_opt().unwrap();
        assert_eq!(
            evaluate(&user(3, Some(yesterday)), None, now(), 3, 3),
            Entitlement::FreeActive { remaining: 3 }
        );
        assert_eq!(evaluate(&user(0, None), None, now(), 0, 3), Entitlement::FreeExhausted);
    }

    #[test]
    fn evaluate_subscription_and_grace() {
        let exhausted = user(3, Some(now().date_naive()));

        let active = subscription(now() + Duration::days(5), true);
        assert_eq!(
            evaluate(&exhausted, Some(&active), now(), 3, 3),
            Entitlement::Subscribed {
                expires_at: active.expires_at
            }
        );

        let lapsed = subscription(now() - Duration::days(2), true);
        assert_eq!(
            evaluate(&exhausted, Some(&lapsed), now(), 3, 3),
            Entitlement::Grace {
                expires_at: lapsed.expires_at
            }
        );

        let beyond_grace = subscription(now() - Duration::days(4), true);
        assert_eq!(
            evaluate(&exhausted, Some(&beyond_grace), now(), 3, 3),
            Entitlement::FreeExhausted
        );

        let inactive = subscription(now() + Duration::days(5), false);
        assert_eq!(
            evaluate(&user(0, None), Some(&inactive), now(), 3, 3),
            Entitlement::FreeActive { remaining: 3 }
        );
    }

    async fn service(config: BillingConfig) -> (Database, Arc<ManualClock>, EntitlementService) {
        let db = Database::connect_in_memory().await.unwrap();
        let clock = Arc::new(ManualClock::new(now()));
        let service = EntitlementService::new(db.clone(), clock.clone(), &config);
        (db, clock, service)
    }

    #[tokio::test]
    async fn admit_counts_free_messages_once_each() {
        let (_db, clock, service) = service(BillingConfig::default()).await;

        assert_eq!(service.admit(1).await.unwrap(), Admission::Free { remaining: 2 });
        assert_eq!(service.admit(1).await.unwrap(), Admission::Free { remaining: 1 });
        assert_eq!(service.admit(1).await.unwrap(), Admission::Free { remaining: 0 });
        assert_eq!(service.admit(1).await.unwrap(), Admission::Exhausted { limit: 3 });
        assert_eq!(service.evaluate(1).await.unwrap(), Entitlement::FreeExhausted);

        // Rejections did not move the counter, and a new day resets it.
        clock.advance(Duration::days(1));
        assert_eq!(service.admit(1).await.unwrap(), Admission::Free { remaining: 2 });
    }

    #[tokio::test]
    async fn concurrent_admissions_never_exceed_the_limit() {
        let (_db, _clock, service) = service(BillingConfig::default()).await;
        let service = Arc::new(service);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move { service.admit(5).await.unwrap() })
            })
            .collect();

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap().is_admitted() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 3);
    }

    #[tokio::test]
    async fn paid_users_and_admin_bypass_the_counter() {
        let (db, _clock, service) = service(BillingConfig::default().with_admin(99)).await;

        for _ in 0..5 {
            assert_eq!(service.admit(99).await.unwrap(), Admission::Privileged);
        }

        user::ensure_user(db.pool(), 1, now()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        subscription::replace_active_subscription(
            &mut conn,
            &NewSubscription {
                user_id: 1,
                plan_type: "monthly".into(),
                price_cents: 2000,
                started_at: now(),
                expires_at: now() + Duration::days(30),
                auto_renew: true,
                payment_id: None,
            },
            now(),
        )
        .await
        .unwrap();
        drop(conn);

        for _ in 0..5 {
            assert!(matches!(
                service.admit(1).await.unwrap(),
                Admission::Entitled(Entitlement::Subscribed { .. })
            ));
        }
        let status = service.status(1).await.unwrap();
        assert_eq!(status.free_messages_remaining, 3);
        let sub = status.subscription.unwrap();
        assert_eq!(sub.days_remaining, 30);
        assert!(sub.auto_renew);
        assert!(!sub.cancelled);
    }

    #[tokio::test]
    async fn status_of_unknown_user() {
        let (_db, _clock, service) = service(BillingConfig::default()).await;
        let status = service.status(404).await.unwrap();
        assert_eq!(status.entitlement, Entitlement::FreeActive { remaining: 3 });
        assert!(status.subscription.is_none());
    }
}
