//! Scan API Handlers

use axum::{Json, extract::State};
use shared::models::{ScanRequest, ScanResult};

use crate::auth::{CurrentUser, Role};
use crate::core::ServerState;
use crate::utils::AppResult;

/// POST /api/scan - 扫码查询，返回完整资格报告
pub async fn scan(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(payload): Json<ScanRequest>,
) -> AppResult<Json<ScanResult>> {
    user.require_role(&[Role::Agent])?;
    Ok(Json(state.vouchers.scan(&payload, &user).await?))
}
