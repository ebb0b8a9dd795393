//! 退款台账
//!
//! 只记录结算标志；实际付款在平台之外完成。金额从凭证复制，不重新计算。

use serde_json::json;
use shared::models::{Refund, RefundMethod, RefundStatus, VoucherStatus};
use shared::util::{now_millis, snowflake_id};
use shared::{AppError, AppResult, ErrorCode};
use sqlx::SqliteConnection;

use crate::audit::{AuditAction, AuditEvent, AuditStorage};
use crate::auth::CurrentUser;
use crate::db::DbService;
use crate::db::repository::{RepoError, refund, voucher};
use crate::utils::validation::{MAX_NOTE_LEN, validate_required_text};
use crate::vouchers::lifecycle::{invalid_status, load_voucher};

#[derive(Clone, Debug)]
pub struct RefundLedger {
    db: DbService,
}

impl RefundLedger {
    pub fn new(db: DbService) -> Self {
        Self { db }
    }

    /// 为已验证的凭证创建 `PENDING` 退款
    ///
    /// 已失败或已取消的退款记录会被重新打开。
    pub async fn initiate(
        &self,
        voucher_id: i64,
        method: RefundMethod,
        actor: &CurrentUser,
    ) -> AppResult<Refund> {
        let now = now_millis();
        let mut tx = self.db.begin_write().await?;
        let current = load_voucher(&mut tx, voucher_id).await?;
        if current.status != VoucherStatus::Validated {
            return Err(invalid_status(&current, "refund"));
        }

        let record = Refund {
            id: snowflake_id(),
            voucher_id,
            status: RefundStatus::Pending,
            method,
            currency: current.currency.clone(),
            gross_amount: current.vat_amount,
            operator_fee: current.operator_fee,
            net_amount: current.refund_amount,
            initiated_by: actor.id.clone(),
            paid_at: None,
            failure_reason: None,
            cancelled_at: None,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        };
        // 一张凭证一条退款：失败/取消的记录重新打开
        let record = match refund::insert(&mut tx, &record).await {
            Ok(()) => record,
            Err(RepoError::Duplicate(_)) => {
                if !refund::reopen(&mut tx, &record).await? {
                    return Err(AppError::new(ErrorCode::RefundAlreadyExists)
                        .with_detail("voucher_id", voucher_id));
                }
                refund::find_by_voucher(&mut tx, voucher_id)
                    .await?
                    .ok_or_else(|| AppError::new(ErrorCode::RefundNotFound))?
            }
            Err(e) => return Err(e.into()),
        };

        AuditStorage::append_in(
            &mut tx,
            AuditEvent::new(AuditAction::RefundInitiated, "refund", record.id)
                .actor(&actor.id, &actor.name)
                .metadata(json!({
                    "voucher_id": voucher_id,
                    "method": method,
                    "net_amount": record.net_amount,
                    "currency": record.currency,
                })),
        )
        .await?;
        tx.commit().await?;

        tracing::info!(refund_id = record.id, voucher_id, "Refund initiated");
        Ok(record)
    }

    /// `PENDING | INITIATED → PAID`，凭证 `VALIDATED → REFUNDED`
    pub async fn mark_paid(&self, refund_id: i64, actor: &CurrentUser) -> AppResult<Refund> {
        let now = now_millis();
        let mut tx = self.db.begin_write().await?;
        let current = load_refund(&mut tx, refund_id).await?;

        if current.status == RefundStatus::Paid {
            return Err(AppError::new(ErrorCode::RefundAlreadyPaid));
        }
        if !refund::mark_paid(&mut tx, refund_id, now).await? {
            return Err(refund_invalid_status(&current));
        }
        if !voucher::mark_refunded(&mut tx, current.voucher_id, now).await? {
            let owner = load_voucher(&mut tx, current.voucher_id).await?;
            return Err(invalid_status(&owner, "mark as refunded"));
        }

        AuditStorage::append_in(
            &mut tx,
            AuditEvent::new(AuditAction::RefundPaid, "refund", refund_id)
                .actor(&actor.id, &actor.name)
                .metadata(json!({
                    "voucher_id": current.voucher_id,
                    "net_amount": current.net_amount,
                })),
        )
        .await?;
        let paid = load_refund(&mut tx, refund_id).await?;
        tx.commit().await?;

        tracing::info!(refund_id, voucher_id = paid.voucher_id, "Refund paid");
        Ok(paid)
    }

    /// `PENDING | INITIATED → FAILED`
    pub async fn mark_failed(
        &self,
        refund_id: i64,
        reason: &str,
        actor: &CurrentUser,
    ) -> AppResult<Refund> {
        validate_required_text(reason, "reason", MAX_NOTE_LEN)?;
        let reason = reason.trim();

        let now = now_millis();
        let mut tx = self.db.begin_write().await?;
        let current = load_refund(&mut tx, refund_id).await?;
        if !refund::mark_failed(&mut tx, refund_id, reason, now).await? {
            return Err(refund_invalid_status(&current));
        }

        AuditStorage::append_in(
            &mut tx,
            AuditEvent::new(AuditAction::RefundFailed, "refund", refund_id)
                .actor(&actor.id, &actor.name)
                .metadata(json!({
                    "voucher_id": current.voucher_id,
                    "reason": reason,
                })),
        )
        .await?;
        let failed = load_refund(&mut tx, refund_id).await?;
        tx.commit().await?;

        tracing::warn!(refund_id, voucher_id = failed.voucher_id, "Refund failed");
        Ok(failed)
    }

    pub async fn get(&self, refund_id: i64) -> AppResult<Refund> {
        let mut conn = self.db.conn().await?;
        load_refund(&mut conn, refund_id).await
    }

    pub async fn find_by_voucher(&self, voucher_id: i64) -> AppResult<Option<Refund>> {
        let mut conn = self.db.conn().await?;
        Ok(refund::find_by_voucher(&mut conn, voucher_id).await?)
    }
}

async fn load_refund(conn: &mut SqliteConnection, id: i64) -> AppResult<Refund> {
    refund::find_by_id(conn, id)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::RefundNotFound).with_detail("refund_id", id))
}

fn refund_invalid_status(current: &Refund) -> AppError {
    AppError::with_message(
        ErrorCode::RefundInvalidStatus,
        format!("Refund {} is {:?}", current.id, current.status),
    )
}
