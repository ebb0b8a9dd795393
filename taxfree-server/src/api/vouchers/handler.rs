//! Voucher API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};
use shared::models::{
    AvailableStatus, DecisionInput, Refund, RefundInitiate, StatusOverride, Validation, Voucher,
    VoucherCancel, VoucherCreate, VoucherQuery,
};

use crate::auth::{CurrentUser, Role};
use crate::core::ServerState;
use crate::utils::{AppError, AppResult};

/// 商户只能看到自己的凭证
fn check_visible(user: &CurrentUser, voucher: &Voucher) -> AppResult<()> {
    if user.role == Role::Merchant && user.merchant_id != Some(voucher.merchant_id) {
        return Err(AppError::permission_denied("Voucher belongs to another merchant"));
    }
    Ok(())
}

/// GET /api/vouchers - 凭证列表
pub async fn list(
    State(state): State<ServerState>,
    user: CurrentUser,
    Query(mut query): Query<VoucherQuery>,
) -> AppResult<Json<Vec<Voucher>>> {
    if user.role == Role::Merchant {
        query.merchant_id = user.merchant_id;
    }
    Ok(Json(state.vouchers.list(&query).await?))
}

/// POST /api/vouchers - 创建凭证
pub async fn create(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(payload): Json<VoucherCreate>,
) -> AppResult<Json<Voucher>> {
    user.require_role(&[Role::Merchant, Role::Operator])?;
    Ok(Json(state.vouchers.create(payload, &user).await?))
}

/// GET /api/vouchers/{id}
pub async fn get_by_id(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Voucher>> {
    let voucher = state.vouchers.get(id).await?;
    check_visible(&user, &voucher)?;
    Ok(Json(voucher))
}

/// GET /api/vouchers/number/{number}
pub async fn get_by_number(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(number): Path<String>,
) -> AppResult<Json<Voucher>> {
    let voucher = state.vouchers.find_by_number(&number).await?;
    check_visible(&user, &voucher)?;
    Ok(Json(voucher))
}

/// POST /api/vouchers/{id}/issue - 签发（打印），可重复调用
pub async fn issue(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Voucher>> {
    user.require_role(&[Role::Merchant, Role::Operator])?;
    Ok(Json(state.vouchers.issue(id, &user).await?))
}

/// POST /api/vouchers/{id}/cancel
pub async fn cancel(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(payload): Json<VoucherCancel>,
) -> AppResult<Json<Voucher>> {
    user.require_role(&[Role::Merchant, Role::Operator])?;
    Ok(Json(state.vouchers.cancel(id, &payload.reason, &user).await?))
}

/// POST /api/vouchers/{id}/decision - 海关决定
pub async fn record_decision(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(payload): Json<DecisionInput>,
) -> AppResult<Json<Validation>> {
    user.require_role(&[Role::Agent])?;
    Ok(Json(state.vouchers.record_decision(id, payload, &user).await?))
}

/// GET /api/vouchers/{id}/validation
pub async fn get_validation(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Option<Validation>>> {
    let voucher = state.vouchers.get(id).await?;
    check_visible(&user, &voucher)?;
    Ok(Json(state.vouchers.validation_of(id).await?))
}

/// GET /api/vouchers/{id}/refund
pub async fn get_refund(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Option<Refund>>> {
    let voucher = state.vouchers.get(id).await?;
    check_visible(&user, &voucher)?;
    Ok(Json(state.refunds.find_by_voucher(id).await?))
}

/// POST /api/vouchers/{id}/refund - 发起退款
pub async fn initiate_refund(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(payload): Json<RefundInitiate>,
) -> AppResult<Json<Refund>> {
    user.require_role(&[Role::Operator])?;
    Ok(Json(state.refunds.initiate(id, payload.method, &user).await?))
}

/// GET /api/vouchers/{id}/overrides - 更正历史
pub async fn override_history(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Vec<StatusOverride>>> {
    user.require_admin()?;
    Ok(Json(state.overrides.history(id).await?))
}

/// GET /api/vouchers/{id}/available-statuses
pub async fn available_statuses(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Vec<AvailableStatus>>> {
    user.require_admin()?;
    Ok(Json(state.overrides.available_statuses(id).await?))
}
