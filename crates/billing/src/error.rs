//! Error types for billing operations.

use database::{DatabaseError, PaymentStatus};
use payment_rails::RailError;
use thiserror::Error;

/// Errors that can occur in entitlement, subscription and payment handling.
#[derive(Debug, Error)]
pub enum BillingError {
    /// Plan id is not in the catalogue.
    #[error("unknown plan: {0}")]
    UnknownPlan(String),

    #[error("payment {0} not found")]
    PaymentNotFound(i64),

    /// Payment is not in the state the operation needs.
    #[error("payment {id} is {actual}, expected {expected}")]
    WrongStatus {
        id: i64,
        actual: PaymentStatus,
        expected: PaymentStatus,
    },

    /// Payment belongs to somebody else.
    #[error("payment {payment_id} does not belong to user {user_id}")]
    NotOwner { payment_id: i64, user_id: i64 },

    #[error("user {0} has no active subscription")]
    NoActiveSubscription(i64),

    /// Provider payload or request failed validation.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// A rail or channel needed for the operation is not configured.
    #[error("not configured: {0}")]
    NotConfigured(String),

    /// Notification or invoice delivery failed.
    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("payment rail error: {0}")]
    Rail(#[from] RailError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// State that the store constraints should have made impossible.
    #[error("invariant violation: {0}")]
    Invariant(String),
}

impl From<sqlx::Error> for BillingError {
    fn from(err: sqlx::Error) -> Self {
        BillingError::Database(DatabaseError::Sqlx(err))
    }
}

impl BillingError {
    /// Caller-fixable errors, surfaced with a readable reason.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            BillingError::UnknownPlan(_)
                | BillingError::PaymentNotFound(_)
                | BillingError::WrongStatus { .. }
                | BillingError::NotOwner { .. }
                | BillingError::NoActiveSubscription(_)
                | BillingError::InvalidPayload(_)
        )
    }

    /// Failures the next natural trigger may not hit again.
    pub fn is_transient(&self) -> bool {
        match self {
            BillingError::Rail(err) => err.is_transient(),
            BillingError::Delivery(_) => true,
            BillingError::Database(DatabaseError::Sqlx(err)) => matches!(
                err,
                sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::Database(_)
            ),
            _ => false,
        }
    }

    /// The payment was already settled or a duplicate reference was seen.
    pub fn is_conflict(&self) -> bool {
        matches!(self, BillingError::WrongStatus { .. })
            || matches!(self, BillingError::Database(err) if err.is_already_exists())
    }
}

/// Result type for billing operations.
pub type Result<T> = std::result::Result<T, BillingError>;
