//! Audit Log API Handlers
//!
//! 审计日志只读：没有任何写入/删除端点。

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Serialize;

use crate::audit::{AuditEntry, AuditQuery, ChainVerification};
use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::utils::AppResult;

#[derive(Debug, Serialize)]
pub struct AuditListResponse {
    pub entries: Vec<AuditEntry>,
    pub total: i64,
}

/// GET /api/audit - 查询审计日志（仅管理员）
pub async fn list(
    State(state): State<ServerState>,
    user: CurrentUser,
    Query(query): Query<AuditQuery>,
) -> AppResult<Json<AuditListResponse>> {
    user.require_admin()?;
    let (entries, total) = state.audit.list(&query).await?;
    Ok(Json(AuditListResponse { entries, total }))
}

/// GET /api/audit/verify - 校验哈希链
pub async fn verify(
    State(state): State<ServerState>,
    user: CurrentUser,
) -> AppResult<Json<ChainVerification>> {
    user.require_admin()?;
    let result = state.audit.verify_chain().await?;
    if !result.valid {
        crate::security_log!(
            "ERROR",
            "audit_chain_broken",
            user_id = user.id.as_str(),
            first_broken_sequence = result.first_broken_sequence.unwrap_or_default()
        );
    }
    Ok(Json(result))
}
