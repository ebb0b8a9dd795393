//! Shift API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};
use shared::models::{Shift, ShiftEnd, ShiftStart};

use crate::api::PageQuery;
use crate::auth::{CurrentUser, Role};
use crate::core::ServerState;
use crate::shifts::ShiftView;
use crate::utils::AppResult;

/// GET /api/shifts - 当前人员的班次列表
pub async fn list(
    State(state): State<ServerState>,
    user: CurrentUser,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<Vec<Shift>>> {
    user.require_role(&[Role::Agent])?;
    Ok(Json(state.shifts.list(&user.id, page.limit, page.offset).await?))
}

/// POST /api/shifts - 开班
pub async fn start(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(payload): Json<ShiftStart>,
) -> AppResult<Json<Shift>> {
    user.require_role(&[Role::Agent])?;
    Ok(Json(state.shifts.start(&user, payload.notes).await?))
}

/// GET /api/shifts/current - 当前未结束班次
pub async fn current(
    State(state): State<ServerState>,
    user: CurrentUser,
) -> AppResult<Json<Option<ShiftView>>> {
    user.require_role(&[Role::Agent])?;
    Ok(Json(state.shifts.current(&user.id).await?))
}

/// POST /api/shifts/{id}/pause
pub async fn pause(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Shift>> {
    user.require_role(&[Role::Agent])?;
    Ok(Json(state.shifts.pause(id, &user).await?))
}

/// POST /api/shifts/{id}/resume
pub async fn resume(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Shift>> {
    user.require_role(&[Role::Agent])?;
    Ok(Json(state.shifts.resume(id, &user).await?))
}

/// POST /api/shifts/{id}/end - 结班并统计
pub async fn end(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(payload): Json<ShiftEnd>,
) -> AppResult<Json<Shift>> {
    user.require_role(&[Role::Agent])?;
    Ok(Json(state.shifts.end(id, &user, payload.notes).await?))
}
