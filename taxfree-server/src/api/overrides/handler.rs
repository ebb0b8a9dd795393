//! Override API Handlers

use axum::{Json, extract::State};
use shared::models::{OverrideOutcome, StatusCorrection};

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::utils::AppResult;

/// POST /api/overrides - 强制更正凭证状态（仅管理员）
pub async fn apply(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(payload): Json<StatusCorrection>,
) -> AppResult<Json<OverrideOutcome>> {
    Ok(Json(state.overrides.apply(payload, &user).await?))
}
