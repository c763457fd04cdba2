//! Route handlers.

pub mod admin;
pub mod chat;
pub mod health;
pub mod payments;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::state::AppState;

/// Build the router with all routes.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        // Chat transport
        .route("/messages", post(chat::message))
        .route("/users/:user_id/reset", post(chat::reset))
        .route("/users/:user_id/status", get(chat::status))
        .route("/users/:user_id/language", post(chat::language))
        .route("/users/:user_id/subscription/cancel", post(payments::cancel_subscription))
        // Payments
        .route("/checkout", post(payments::checkout))
        .route("/payments/pre-checkout", post(payments::pre_checkout))
        .route("/payments/completed", post(payments::provider_completed))
        .route("/payments/:payment_id/check", post(payments::check_invoice))
        .route("/payments/:payment_id/cancel", post(payments::self_cancel))
        // Admin
        .route("/admin/payments/pending", get(admin::pending))
        .route("/admin/payments/:payment_id/confirm", post(admin::confirm))
        .route("/admin/payments/:payment_id/reject", post(admin::reject))
        .route("/admin/grants", post(admin::grant))
        .layer(middleware::from_fn_with_state(state.clone(), require_token));

    Router::new()
        .route("/health", get(health::health))
        .nest("/v1", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Reject requests without the configured bearer token.
async fn require_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(expected) = state.api_token.as_deref() {
        let token = request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.strip_prefix("Bearer ").unwrap_or(value));
        if token != Some(expected) {
            return Err(ApiError::Unauthorized);
        }
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests;
