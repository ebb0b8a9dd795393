//! Refund API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use shared::models::{Refund, RefundFail};

use crate::auth::{CurrentUser, Role};
use crate::core::ServerState;
use crate::utils::AppResult;

/// GET /api/refunds/{id}
pub async fn get_by_id(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Refund>> {
    user.require_role(&[Role::Operator])?;
    Ok(Json(state.refunds.get(id).await?))
}

/// POST /api/refunds/{id}/paid - 结算完成
pub async fn mark_paid(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Refund>> {
    user.require_role(&[Role::Operator])?;
    Ok(Json(state.refunds.mark_paid(id, &user).await?))
}

/// POST /api/refunds/{id}/failed - 结算失败
pub async fn mark_failed(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(payload): Json<RefundFail>,
) -> AppResult<Json<Refund>> {
    user.require_role(&[Role::Operator])?;
    Ok(Json(state.refunds.mark_failed(id, &payload.reason, &user).await?))
}
