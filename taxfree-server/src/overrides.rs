//! 管理员状态更正
//!
//! 在状态机之外强制迁移凭证状态。状态、验证记录、退款、更正记录和审计
//! 在同一事务中完成；通知在提交之后发送。

use serde_json::json;
use shared::models::{
    AvailableStatus, MIN_OVERRIDE_REASON_LEN, NotificationTarget, OverrideOutcome, OverrideType,
    RefusalReason, Refund, RefundMethod, RefundStatus, StatusCorrection, StatusOverride,
    Validation, ValidationDecision, Voucher, VoucherStatus,
};
use shared::util::{now_millis, snowflake_id};
use shared::{AppError, AppResult, ErrorCode};
use sqlx::SqliteConnection;

use crate::audit::{AuditAction, AuditEvent, AuditStorage};
use crate::auth::CurrentUser;
use crate::db::DbService;
use crate::db::repository::{refund, status_override, validation, voucher};
use crate::notify::{OutgoingNotification, SharedNotificationSink, dispatch_all};
use crate::token::TokenSigner;
use crate::utils::validation::{MAX_NOTE_LEN, MAX_SHORT_TEXT_LEN, validate_optional_text};
use crate::vouchers::lifecycle::load_voucher;

#[derive(Clone, Debug)]
pub struct OverrideAuthority {
    db: DbService,
    signer: TokenSigner,
    notifier: SharedNotificationSink,
}

impl OverrideAuthority {
    pub fn new(db: DbService, signer: TokenSigner, notifier: SharedNotificationSink) -> Self {
        Self {
            db,
            signer,
            notifier,
        }
    }

    /// Force a voucher into `new_status`
    pub async fn apply(
        &self,
        request: StatusCorrection,
        actor: &CurrentUser,
    ) -> AppResult<OverrideOutcome> {
        actor.require_admin()?;
        let reason = request.reason.trim().to_string();
        if reason.chars().count() < MIN_OVERRIDE_REASON_LEN {
            return Err(AppError::new(ErrorCode::OverrideReasonTooShort)
                .with_detail("min_length", MIN_OVERRIDE_REASON_LEN));
        }
        if reason.len() > MAX_NOTE_LEN {
            return Err(AppError::validation(format!(
                "reason is too long (max {MAX_NOTE_LEN})"
            )));
        }
        validate_optional_text(
            &request.reference_document,
            "reference_document",
            MAX_SHORT_TEXT_LEN,
        )?;
        validate_optional_text(
            &request.requesting_agent_id,
            "requesting_agent_id",
            MAX_SHORT_TEXT_LEN,
        )?;

        let now = now_millis();
        let mut tx = self.db.begin_write().await?;
        let current = load_voucher(&mut tx, request.voucher_id).await?;
        let previous = current.status;
        let target = request.new_status;

        // 1. 前置条件
        if previous == target {
            return Err(AppError::new(ErrorCode::OverrideSameStatus)
                .with_detail("status", previous.as_str()));
        }
        let existing_refund = refund::find_by_voucher(&mut tx, current.id).await?;
        if existing_refund
            .as_ref()
            .is_some_and(|r| r.status == RefundStatus::Paid)
        {
            return Err(AppError::new(ErrorCode::OverrideRefundPaid)
                .with_detail("voucher_number", current.voucher_number.clone()));
        }

        // 2. 先快照原验证记录，再做任何修改
        let existing_validation = validation::find_by_voucher(&mut tx, current.id).await?;
        let original_validation = existing_validation.as_ref().map(Validation::snapshot);
        let override_type = OverrideType::classify(previous, target);

        // 3. 级联
        cascade_validation(&mut tx, &current, target, &reason, actor, now).await?;
        cascade_refund(
            &mut tx,
            &current,
            target,
            existing_refund.as_ref(),
            &reason,
            actor,
            now,
        )
        .await?;

        let mut updated = current.clone();
        updated.status = target;
        match target {
            VoucherStatus::Validated => updated.validated_at = Some(now),
            VoucherStatus::Issued | VoucherStatus::ValidationPending | VoucherStatus::Refused => {
                updated.validated_at = None;
            }
            _ => {}
        }
        if target == VoucherStatus::Cancelled {
            updated.cancelled_at = Some(now);
            updated.cancelled_by = Some(actor.id.clone());
            updated.cancellation_reason = Some(reason.clone());
        } else {
            updated.cancelled_at = None;
            updated.cancelled_by = None;
            updated.cancellation_reason = None;
        }
        // 强制签发的凭证同样需要可扫码的令牌
        if target == VoucherStatus::Issued && updated.token_payload.is_none() {
            let signed = self.signer.sign(&updated);
            updated.issued_at = Some(now);
            updated.token_payload = Some(signed.payload);
            updated.token_signature = Some(signed.signature);
        }
        if !voucher::overwrite_state(&mut tx, &updated, previous, now).await? {
            return Err(AppError::conflict("Voucher changed during the override"));
        }

        // 4. 通知对象
        let mut targets = Vec::new();
        if request.notify_parties {
            if let Some(v) = &existing_validation {
                targets.push(NotificationTarget::agent(v.agent_id.clone()));
            }
            targets.push(NotificationTarget::merchant(current.merchant_id));
        }

        // 5. 更正记录 + 审计
        let record = StatusOverride {
            id: snowflake_id(),
            voucher_id: current.id,
            previous_status: previous,
            new_status: target,
            override_type,
            original_validation,
            reason: reason.clone(),
            reference_document: request.reference_document.clone(),
            requesting_agent_id: request.requesting_agent_id.clone(),
            performed_by_id: actor.id.clone(),
            performed_by_name: actor.name.clone(),
            notifications: targets.clone(),
            created_at: now,
        };
        status_override::insert(&mut tx, &record).await?;
        AuditStorage::append_in(
            &mut tx,
            AuditEvent::new(AuditAction::StatusOverride, "voucher", current.id)
                .actor(&actor.id, &actor.name)
                .metadata(json!({
                    "override_id": record.id,
                    "voucher_number": current.voucher_number,
                    "previous_status": previous,
                    "new_status": target,
                    "override_type": override_type,
                    "reason": reason,
                    "reference_document": record.reference_document,
                    "requesting_agent_id": record.requesting_agent_id,
                })),
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            voucher_id = current.id,
            override_id = record.id,
            previous = %previous,
            new = %target,
            override_type = ?override_type,
            "Status override applied"
        );

        // 6. 提交后发送通知 (best-effort)
        let outgoing: Vec<OutgoingNotification> = targets
            .into_iter()
            .map(|target_party| OutgoingNotification {
                target: target_party,
                title: format!("Voucher {} corrected", current.voucher_number),
                message: format!(
                    "Status changed from {} to {} by {}: {}",
                    previous.label(),
                    target.label(),
                    actor.name,
                    reason
                ),
                related_entity: "voucher",
                related_id: current.id.to_string(),
            })
            .collect();
        let notifications_sent = dispatch_all(self.notifier.as_ref(), &outgoing).await;

        Ok(OverrideOutcome {
            success: true,
            override_id: record.id,
            previous_status: previous,
            new_status: target,
            notifications_sent,
        })
    }

    /// Overrides of a voucher, newest first
    pub async fn history(&self, voucher_id: i64) -> AppResult<Vec<StatusOverride>> {
        let mut conn = self.db.conn().await?;
        load_voucher(&mut conn, voucher_id).await?;
        Ok(status_override::list_by_voucher(&mut conn, voucher_id).await?)
    }

    /// Statuses an override could move the voucher to
    pub async fn available_statuses(&self, voucher_id: i64) -> AppResult<Vec<AvailableStatus>> {
        let mut conn = self.db.conn().await?;
        let current = load_voucher(&mut conn, voucher_id).await?;
        Ok(AvailableStatus::for_current(current.status))
    }
}

async fn cascade_validation(
    conn: &mut SqliteConnection,
    current: &Voucher,
    target: VoucherStatus,
    reason: &str,
    actor: &CurrentUser,
    now: i64,
) -> AppResult<()> {
    let rewrite = |decision, refusal_reason, refusal_details, control_notes| Validation {
        id: snowflake_id(),
        voucher_id: current.id,
        decision,
        refusal_reason,
        refusal_details,
        physical_control_done: false,
        control_notes,
        agent_id: actor.id.clone(),
        agent_name: actor.name.clone(),
        exit_point_id: None,
        decided_at: now,
        is_offline: false,
        offline_batch_id: None,
        offline_timestamp: None,
        synced_at: None,
    };

    match target {
        VoucherStatus::Issued | VoucherStatus::ValidationPending => {
            if validation::delete_by_voucher(conn, current.id).await? {
                tracing::info!(voucher_id = current.id, "Validation removed, voucher reopened");
            }
        }
        VoucherStatus::Validated => {
            let record = rewrite(
                ValidationDecision::Validated,
                None,
                None,
                Some(format!("Status override: {reason}")),
            );
            validation::upsert(conn, &record).await?;
        }
        VoucherStatus::Refused => {
            let record = rewrite(
                ValidationDecision::Refused,
                Some(RefusalReason::Other),
                Some(format!("Refused by status override: {reason}")),
                None,
            );
            validation::upsert(conn, &record).await?;
        }
        _ => {}
    }
    Ok(())
}

async fn cascade_refund(
    conn: &mut SqliteConnection,
    current: &Voucher,
    target: VoucherStatus,
    existing: Option<&Refund>,
    reason: &str,
    actor: &CurrentUser,
    now: i64,
) -> AppResult<()> {
    let leaving_settled = matches!(
        current.status,
        VoucherStatus::Validated | VoucherStatus::Refunded
    ) && !matches!(target, VoucherStatus::Validated | VoucherStatus::Refunded);

    if target == VoucherStatus::Refunded {
        match existing {
            Some(r) => {
                refund::force_paid(conn, r.id, now).await?;
            }
            None => {
                let paid = Refund {
                    id: snowflake_id(),
                    voucher_id: current.id,
                    status: RefundStatus::Paid,
                    method: RefundMethod::Cash,
                    currency: current.currency.clone(),
                    gross_amount: current.vat_amount,
                    operator_fee: current.operator_fee,
                    net_amount: current.refund_amount,
                    initiated_by: actor.id.clone(),
                    paid_at: Some(now),
                    failure_reason: None,
                    cancelled_at: None,
                    cancellation_reason: None,
                    created_at: now,
                    updated_at: now,
                };
                refund::insert(conn, &paid).await?;
            }
        }
    } else if leaving_settled && let Some(r) = existing {
        if r.status == RefundStatus::Paid {
            // 已付款退款不回滚，需人工对账
            tracing::warn!(
                voucher_id = current.id,
                refund_id = r.id,
                "Refund already paid, left untouched by override"
            );
        } else if refund::cancel_unpaid(conn, current.id, reason, now).await? {
            tracing::info!(voucher_id = current.id, refund_id = r.id, "Refund cancelled by override");
        }
    }
    Ok(())
}
