//! Offline Sync API Handlers
//!
//! 部分成功是正常结果：逐项错误写在响应体中，HTTP 状态仍为 200。

use axum::{
    Json,
    extract::{Query, State},
};
use shared::models::{OfflineSyncBatch, SyncRequest, SyncResponse};

use crate::api::PageQuery;
use crate::auth::{CurrentUser, Role};
use crate::core::ServerState;
use crate::utils::AppResult;

/// POST /api/sync - 提交离线批次
pub async fn sync(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(payload): Json<SyncRequest>,
) -> AppResult<Json<SyncResponse>> {
    user.require_role(&[Role::Agent])?;
    Ok(Json(state.sync.sync(payload, &user).await?))
}

/// GET /api/sync/history - 当前人员的批次记录
pub async fn history(
    State(state): State<ServerState>,
    user: CurrentUser,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<Vec<OfflineSyncBatch>>> {
    user.require_role(&[Role::Agent])?;
    Ok(Json(
        state.sync.history(&user.id, page.limit, page.offset).await?,
    ))
}
