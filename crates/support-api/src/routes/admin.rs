//! Admin actions: pending payments, confirm, reject and grant.
//!
//! Every request names the acting admin, which must match `ADMIN_USER_ID`.

use axum::extract::{Path, Query, State};
use axum::Json;
use database::{Payment, Subscription};
use serde::Deserialize;
use tracing::info;

use crate::error::{ApiError, Result};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AdminQuery {
    pub admin_id: i64,
}

fn require_admin(state: &AppState, admin_id: i64) -> Result<()> {
    if state.entitlement.is_admin(admin_id) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!("user {admin_id} is not an admin")))
    }
}

pub async fn pending(
    State(state): State<AppState>,
    Query(query): Query<AdminQuery>,
) -> Result<Json<Vec<Payment>>> {
    require_admin(&state, query.admin_id)?;
    Ok(Json(state.payments.list_pending().await?))
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub admin_id: i64,
}

pub async fn confirm(
    State(state): State<AppState>,
    Path(payment_id): Path<i64>,
    Json(request): Json<ConfirmRequest>,
) -> Result<Json<Subscription>> {
    require_admin(&state, request.admin_id)?;
    let subscription = state.payments.confirm(payment_id, request.admin_id).await?;
    Ok(Json(subscription))
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub admin_id: i64,
    #[serde(default)]
    pub reason: Option<String>,
}

pub async fn reject(
    State(state): State<AppState>,
    Path(payment_id): Path<i64>,
    Json(request): Json<RejectRequest>,
) -> Result<Json<Payment>> {
    require_admin(&state, request.admin_id)?;
    let payment = state
        .payments
        .cancel_payment(payment_id, request.admin_id, request.reason.as_deref())
        .await?;
    Ok(Json(payment))
}

#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    pub admin_id: i64,
    pub user_id: i64,
    pub plan: String,
}

pub async fn grant(
    State(state): State<AppState>,
    Json(request): Json<GrantRequest>,
) -> Result<Json<Subscription>> {
    require_admin(&state, request.admin_id)?;
    let subscription = state
        .subscriptions
        .grant(request.user_id, &request.plan, request.admin_id)
        .await?;
    info!(user_id = request.user_id, plan = %request.plan, "Subscription granted via API");
    Ok(Json(subscription))
}
