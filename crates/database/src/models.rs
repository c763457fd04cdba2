//! Database models.
//!
//! Timestamps are stored as unix seconds and decoded into `DateTime<Utc>`.
//! Money is stored in minor units (cents) to keep amounts exact.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A user, identified by their messaging platform id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    /// Platform user id.
    pub user_id: i64,
    /// Platform username, if the user has one.
    pub username: Option<String>,
    /// Display first name.
    pub first_name: Option<String>,
    /// Interface language (e.g. "ru", "en").
    pub language_code: String,
    pub created_at: DateTime<Utc>,
    pub last_interaction: DateTime<Utc>,
    /// Free messages consumed on `free_messages_reset_date`.
    pub free_messages_today: i64,
    /// Calendar day the counter belongs to. A counter from an earlier day is stale.
    pub free_messages_reset_date: Option<NaiveDate>,
}

impl User {
    /// Free messages used on `today`, treating a stale counter as zero.
    pub fn free_messages_used_on(&self, today: NaiveDate) -> i64 {
        match self.free_messages_reset_date {
            Some(date) if date >= today => self.free_messages_today,
            _ => 0,
        }
    }
}

/// Author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// A single stored conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Message {
    /// Monotonic id, used to order turns sharing a timestamp.
    pub id: i64,
    pub user_id: i64,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// The single long-term memory record of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ChatSummary {
    pub user_id: i64,
    /// Rolling summary text.
    pub summary: String,
    /// Total number of turns folded into the summary so far.
    pub messages_summarized: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lifecycle state of a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    AwaitingConfirmation,
    Completed,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::AwaitingConfirmation => "awaiting_confirmation",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Completed | PaymentStatus::Failed | PaymentStatus::Cancelled
        )
    }

    /// Whether `self -> next` is an allowed transition.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        matches!(
            (self, next),
            (PaymentStatus::Pending, PaymentStatus::AwaitingConfirmation)
                | (
                    PaymentStatus::AwaitingConfirmation,
                    PaymentStatus::Completed | PaymentStatus::Cancelled | PaymentStatus::Failed
                )
        )
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payment attempt for a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: i64,
    pub user_id: i64,
    /// Amount in minor units of `currency` (cents for USD/USDT, whole Stars for XTR).
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub plan_type: String,
    /// Blockchain hash or provider charge id that settled this payment.
    pub tx_ref: Option<String>,
    /// Third-party invoice/order id.
    pub invoice_ref: Option<String>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    /// Admin id for manual confirmations and cancellations.
    pub confirmed_by: Option<i64>,
}

/// A paid (or granted) period of access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Subscription {
    pub id: i64,
    pub user_id: i64,
    pub plan_type: String,
    pub price_cents: i64,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub auto_renew: bool,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    pub reminder_3_days_sent: bool,
    pub reminder_1_day_sent: bool,
    pub reminder_expired_sent: bool,
    pub auto_renew_invoice_sent: bool,
    /// Payment that created this subscription, absent for admin grants.
    pub payment_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Whole days left until expiry, 0 once expired.
    pub fn days_remaining(&self, now: DateTime<Utc>) -> i64 {
        if self.is_expired(now) {
            return 0;
        }
        (self.expires_at - now).num_days()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn subscription(expires_at: DateTime<Utc>) -> Subscription {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        Subscription {
            id: 1,
            user_id: 1,
            plan_type: "monthly".to_string(),
            price_cents: 2000,
            started_at: start,
            expires_at,
            is_active: true,
            auto_renew: true,
            cancelled_at: None,
            cancel_reason: None,
            reminder_3_days_sent: false,
            reminder_1_day_sent: false,
            reminder_expired_sent: false,
            auto_renew_invoice_sent: false,
            payment_id: None,
            created_at: start,
        }
    }

    #[test]
    fn days_remaining_floors_partial_days() {
        let now = Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap();
        let sub = subscription(now + Duration::hours(71));
        assert_eq!(sub.days_remaining(now), 2);
        assert!(!sub.is_expired(now));
    }

    #[test]
    fn expired_subscription_has_no_days_left() {
        let now = Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap();
        let sub = subscription(now - Duration::seconds(1));
        assert!(sub.is_expired(now));
        assert_eq!(sub.days_remaining(now), 0);
    }

    #[test]
    fn payment_transitions() {
        use PaymentStatus::*;
        assert!(Pending.can_transition_to(AwaitingConfirmation));
        assert!(AwaitingConfirmation.can_transition_to(Completed));
        assert!(AwaitingConfirmation.can_transition_to(Cancelled));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Completed));
        assert!(Failed.is_terminal());
    }

    #[test]
    fn stale_free_counter_reads_as_zero() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 2).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 3, 2, 9, 0, 0).unwrap();
        let mut user = User {
            user_id: 7,
            username: None,
            first_name: None,
            language_code: "en".to_string(),
            created_at: now,
            last_interaction: now,
            free_messages_today: 3,
            free_messages_reset_date: NaiveDate::from_ymd_opt(2025, 3, 1),
        };
        assert_eq!(user.free_messages_used_on(today), 0);
        user.free_messages_reset_date = Some(today);
        assert_eq!(user.free_messages_used_on(today), 3);
    }
}
