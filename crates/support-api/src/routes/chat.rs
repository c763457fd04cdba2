//! Chat turns, reset, status and language.

use axum::extract::{Path, State};
use axum::Json;
use billing::StatusView;
use database::user;
use orchestrator::{InboundMessage, Reply};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ApiError, Result};
use crate::state::AppState;

pub async fn message(
    State(state): State<AppState>,
    Json(inbound): Json<InboundMessage>,
) -> Result<Json<Reply>> {
    let reply = state.orchestrator.handle_message(&inbound).await?;
    Ok(Json(reply))
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub cleared: u64,
}

pub async fn reset(State(state): State<AppState>, Path(user_id): Path<i64>) -> Result<Json<ResetResponse>> {
    let cleared = state.orchestrator.reset(user_id).await?;
    Ok(Json(ResetResponse { cleared }))
}

pub async fn status(State(state): State<AppState>, Path(user_id): Path<i64>) -> Result<Json<StatusView>> {
    let view = state.entitlement.status(user_id).await?;
    Ok(Json(view))
}

#[derive(Debug, Deserialize)]
pub struct LanguageRequest {
    pub language_code: String,
}

#[derive(Debug, Serialize)]
pub struct LanguageResponse {
    pub language_code: String,
}

pub async fn language(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(request): Json<LanguageRequest>,
) -> Result<Json<LanguageResponse>> {
    let code = request.language_code.trim().to_lowercase();
    if code.is_empty() || code.len() > 8 {
        return Err(ApiError::BadRequest("invalid language code".to_string()));
    }
    user::set_language(state.db.pool(), user_id, &code).await?;
    info!(user_id, language = %code, "Language updated");
    Ok(Json(LanguageResponse { language_code: code }))
}
