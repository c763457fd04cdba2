//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use billing::BillingError;
use orchestrator::OrchestratorError;
use thiserror::Error;
use tracing::{error, warn};

/// Errors returned by route handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// The resource moved on concurrently (payment no longer awaiting, etc).
    #[error("{0}")]
    Conflict(String),

    /// Rail or channel not configured.
    #[error("{0}")]
    Unavailable(String),

    /// An upstream provider failed; retrying later may succeed.
    #[error("{0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        match &err {
            BillingError::PaymentNotFound(_) | BillingError::NoActiveSubscription(_) => {
                ApiError::NotFound(err.to_string())
            }
            BillingError::NotOwner { .. } => ApiError::Forbidden(err.to_string()),
            _ if err.is_conflict() => ApiError::Conflict(err.to_string()),
            _ if err.is_validation() => ApiError::BadRequest(err.to_string()),
            BillingError::NotConfigured(_) => ApiError::Unavailable(err.to_string()),
            _ if err.is_transient() => ApiError::Upstream(err.to_string()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::Rejected(reason) => ApiError::BadRequest(reason),
            OrchestratorError::Billing(err) => err.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<database::DatabaseError> for ApiError {
    fn from(err: database::DatabaseError) -> Self {
        if err.is_not_found() {
            ApiError::NotFound(err.to_string())
        } else {
            ApiError::Internal(err.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = match &self {
            ApiError::Internal(detail) => {
                error!(error = %detail, "Request failed");
                "Internal server error".to_string()
            }
            ApiError::Unauthorized => {
                warn!("Unauthorized request");
                self.to_string()
            }
            other => other.to_string(),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Result type for route handlers.
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use database::PaymentStatus;

    #[test]
    fn billing_errors_map_to_statuses() {
        let cases = [
            (BillingError::UnknownPlan("weekly".into()), StatusCode::BAD_REQUEST),
            (BillingError::PaymentNotFound(9), StatusCode::NOT_FOUND),
            (
                BillingError::WrongStatus {
                    id: 1,
                    actual: PaymentStatus::Completed,
                    expected: PaymentStatus::AwaitingConfirmation,
                },
                StatusCode::CONFLICT,
            ),
            (
                BillingError::NotOwner { payment_id: 1, user_id: 2 },
                StatusCode::FORBIDDEN,
            ),
            (BillingError::NotConfigured("gateway".into()), StatusCode::SERVICE_UNAVAILABLE),
            (BillingError::Invariant("double".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), expected);
        }
    }
}
