//! Invoice API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use shared::models::{Invoice, InvoiceCreate};

use crate::auth::{CurrentUser, Role};
use crate::core::ServerState;
use crate::db::repository::{invoice, merchant};
use crate::utils::validation::{
    MAX_NAME_LEN, MAX_SHORT_TEXT_LEN, validate_code, validate_required_text,
};
use crate::utils::{AppError, AppResult, ErrorCode};

/// POST /api/invoices - 登记发票（登记后不可修改）
pub async fn create(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(payload): Json<InvoiceCreate>,
) -> AppResult<Json<Invoice>> {
    user.require_role(&[Role::Merchant, Role::Operator])?;
    if user.role == Role::Merchant && user.merchant_id != Some(payload.merchant_id) {
        return Err(AppError::permission_denied(
            "Merchants can only register their own invoices",
        ));
    }
    validate_required_text(&payload.invoice_number, "invoice_number", MAX_SHORT_TEXT_LEN)?;
    validate_code(&payload.currency, "currency", 3)?;
    for item in &payload.items {
        validate_required_text(&item.description, "description", MAX_NAME_LEN)?;
        validate_required_text(&item.category, "category", MAX_SHORT_TEXT_LEN)?;
    }

    let mut tx = state.db.begin_write().await?;
    if merchant::find_by_id(&mut tx, payload.merchant_id).await?.is_none() {
        return Err(AppError::new(ErrorCode::MerchantNotFound));
    }
    let created = invoice::create(&mut tx, payload).await?;
    tx.commit().await?;

    tracing::info!(
        invoice_id = created.id,
        merchant_id = created.merchant_id,
        items = created.items.len(),
        "Invoice registered"
    );
    Ok(Json(created))
}

/// GET /api/invoices/{id}
pub async fn get_by_id(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Invoice>> {
    let mut conn = state.db.conn().await?;
    let found = invoice::find_by_id(&mut conn, id)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::InvoiceNotFound))?;
    if user.role == Role::Merchant && user.merchant_id != Some(found.merchant_id) {
        return Err(AppError::permission_denied("Invoice belongs to another merchant"));
    }
    Ok(Json(found))
}
