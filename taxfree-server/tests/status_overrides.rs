//! Administrative status overrides

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use common::{admin, agent, operator, setup, setup_with_notifier, voucher_request};
use shared::ErrorCode;
use shared::models::{
    DecisionInput, OverrideType, RecipientKind, RefundMethod, RefundStatus, RefusalReason,
    ScanRequest, StatusCorrection, ValidationDecision, VoucherStatus,
};
use taxfree_server::db::repository::notification;
use taxfree_server::notify::{NotificationSink, NotifyError, OutgoingNotification};

/// Reaches agents, never merchants
#[derive(Debug)]
struct MerchantChannelDown;

#[async_trait]
impl NotificationSink for MerchantChannelDown {
    async fn send(&self, n: &OutgoingNotification) -> Result<(), NotifyError> {
        match n.target.kind {
            RecipientKind::Merchant => Err(NotifyError::Unavailable("merchant gateway".into())),
            _ => Ok(()),
        }
    }
}

fn correction(voucher_id: i64, new_status: VoucherStatus) -> StatusCorrection {
    StatusCorrection {
        voucher_id,
        new_status,
        reason: "Agent confirmed the goods were presented".into(),
        reference_document: Some("MEMO-2026-17".into()),
        requesting_agent_id: Some("agent-1".into()),
        notify_parties: true,
    }
}

#[tokio::test]
async fn test_refused_to_validated_is_a_reversal() {
    let fx = setup().await;
    let v = fx.issued_voucher().await;
    fx.state
        .vouchers
        .record_decision(
            v.id,
            DecisionInput::refused(RefusalReason::GoodsNotPresent),
            &agent("agent-1"),
        )
        .await
        .unwrap();

    let outcome = fx
        .state
        .overrides
        .apply(correction(v.id, VoucherStatus::Validated), &admin())
        .await
        .unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.previous_status, VoucherStatus::Refused);
    assert_eq!(outcome.new_status, VoucherStatus::Validated);
    assert_eq!(outcome.notifications_sent.len(), 2);
    assert!(
        outcome
            .notifications_sent
            .iter()
            .any(|t| t.kind == RecipientKind::Agent && t.recipient_id == "agent-1")
    );

    let after = fx.state.vouchers.get(v.id).await.unwrap();
    assert_eq!(after.status, VoucherStatus::Validated);
    assert!(after.validated_at.is_some());
    let rewritten = fx.state.vouchers.validation_of(v.id).await.unwrap().unwrap();
    assert_eq!(rewritten.decision, ValidationDecision::Validated);
    assert!(rewritten.refusal_reason.is_none());

    let mut conn = fx.state.db.conn().await.unwrap();
    let inbox = notification::list_for_recipient(&mut conn, RecipientKind::Agent, "agent-1", 10, 0)
        .await
        .unwrap();
    drop(conn);
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].related_id, v.id.to_string());

    let history = fx.state.overrides.history(v.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].override_type, OverrideType::ValidationReversal);
    let original = history[0].original_validation.as_ref().unwrap();
    assert_eq!(original.decision, ValidationDecision::Refused);
}

#[tokio::test]
async fn test_reopen_removes_validation_and_cancels_refund() {
    let fx = setup().await;
    let v = fx.validated_voucher().await;
    let refund = fx
        .state
        .refunds
        .initiate(v.id, RefundMethod::Card, &operator())
        .await
        .unwrap();

    fx.state
        .overrides
        .apply(correction(v.id, VoucherStatus::ValidationPending), &admin())
        .await
        .unwrap();

    let after = fx.state.vouchers.get(v.id).await.unwrap();
    assert_eq!(after.status, VoucherStatus::ValidationPending);
    assert!(after.validated_at.is_none());
    assert!(fx.state.vouchers.validation_of(v.id).await.unwrap().is_none());
    let cancelled = fx.state.refunds.get(refund.id).await.unwrap();
    assert_eq!(cancelled.status, RefundStatus::Cancelled);

    // 重新开放后可以再次决定，原退款记录重新打开
    fx.state
        .vouchers
        .record_decision(v.id, DecisionInput::validated(), &agent("agent-2"))
        .await
        .unwrap();
    let reopened = fx
        .state
        .refunds
        .initiate(v.id, RefundMethod::BankTransfer, &operator())
        .await
        .unwrap();
    assert_eq!(reopened.id, refund.id);
    assert_eq!(reopened.status, RefundStatus::Pending);
    assert_eq!(reopened.method, RefundMethod::BankTransfer);
    assert!(reopened.cancelled_at.is_none());
}

#[tokio::test]
async fn test_same_status_rejected() {
    let fx = setup().await;
    let v = fx.issued_voucher().await;

    let err = fx
        .state
        .overrides
        .apply(correction(v.id, VoucherStatus::Issued), &admin())
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::OverrideSameStatus);
}

#[tokio::test]
async fn test_paid_refund_blocks_override() {
    let fx = setup().await;
    let v = fx.validated_voucher().await;
    let op = operator();
    let refund = fx
        .state
        .refunds
        .initiate(v.id, RefundMethod::Cash, &op)
        .await
        .unwrap();
    fx.state.refunds.mark_paid(refund.id, &op).await.unwrap();

    let err = fx
        .state
        .overrides
        .apply(correction(v.id, VoucherStatus::Refused), &admin())
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::OverrideRefundPaid);
    assert_eq!(
        fx.state.vouchers.get(v.id).await.unwrap().status,
        VoucherStatus::Refunded
    );
}

#[tokio::test]
async fn test_override_requires_admin_and_reason() {
    let fx = setup().await;
    let v = fx.issued_voucher().await;

    let err = fx
        .state
        .overrides
        .apply(correction(v.id, VoucherStatus::Cancelled), &agent("agent-1"))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::AdminRequired);

    let mut short = correction(v.id, VoucherStatus::Cancelled);
    short.reason = "  typo   ".into();
    let err = fx.state.overrides.apply(short, &admin()).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::OverrideReasonTooShort);
}

#[tokio::test]
async fn test_override_to_cancelled_records_canceller() {
    let fx = setup().await;
    let v = fx.issued_voucher().await;
    let mut quiet = correction(v.id, VoucherStatus::Cancelled);
    quiet.notify_parties = false;

    let outcome = fx.state.overrides.apply(quiet, &admin()).await.unwrap();
    assert!(outcome.notifications_sent.is_empty());

    let after = fx.state.vouchers.get(v.id).await.unwrap();
    assert_eq!(after.status, VoucherStatus::Cancelled);
    assert_eq!(after.cancelled_by.as_deref(), Some("admin-1"));
}

#[tokio::test]
async fn test_available_statuses_excludes_current() {
    let fx = setup().await;
    let v = fx.issued_voucher().await;

    let options = fx.state.overrides.available_statuses(v.id).await.unwrap();
    assert_eq!(options.len(), 7);
    assert!(options.iter().all(|o| o.status != VoucherStatus::Issued));
}

#[tokio::test]
async fn test_refunded_without_refund_records_cash_payment() {
    let fx = setup().await;
    let v = fx.validated_voucher().await;

    fx.state
        .overrides
        .apply(correction(v.id, VoucherStatus::Refunded), &admin())
        .await
        .unwrap();

    assert_eq!(
        fx.state.vouchers.get(v.id).await.unwrap().status,
        VoucherStatus::Refunded
    );
    let paid = fx.state.refunds.find_by_voucher(v.id).await.unwrap().unwrap();
    assert_eq!(paid.status, RefundStatus::Paid);
    assert_eq!(paid.method, RefundMethod::Cash);
    assert_eq!(paid.net_amount, v.refund_amount);
    assert!(paid.paid_at.is_some());
}

#[tokio::test]
async fn test_refunded_force_pays_pending_refund() {
    let fx = setup().await;
    let v = fx.validated_voucher().await;
    let pending = fx
        .state
        .refunds
        .initiate(v.id, RefundMethod::MobileMoney, &operator())
        .await
        .unwrap();
    assert_eq!(pending.status, RefundStatus::Pending);

    fx.state
        .overrides
        .apply(correction(v.id, VoucherStatus::Refunded), &admin())
        .await
        .unwrap();

    let paid = fx.state.refunds.get(pending.id).await.unwrap();
    assert_eq!(paid.status, RefundStatus::Paid);
    assert_eq!(paid.method, RefundMethod::MobileMoney);
    assert!(paid.paid_at.is_some());
}

#[tokio::test]
async fn test_validated_to_refused_cancels_refund_and_rewrites_decision() {
    let fx = setup().await;
    let v = fx.validated_voucher().await;
    let pending = fx
        .state
        .refunds
        .initiate(v.id, RefundMethod::Card, &operator())
        .await
        .unwrap();

    let outcome = fx
        .state
        .overrides
        .apply(correction(v.id, VoucherStatus::Refused), &admin())
        .await
        .unwrap();
    assert_eq!(outcome.previous_status, VoucherStatus::Validated);

    let after = fx.state.vouchers.get(v.id).await.unwrap();
    assert_eq!(after.status, VoucherStatus::Refused);
    assert!(after.validated_at.is_none());
    assert_eq!(
        fx.state.refunds.get(pending.id).await.unwrap().status,
        RefundStatus::Cancelled
    );
    let rewritten = fx.state.vouchers.validation_of(v.id).await.unwrap().unwrap();
    assert_eq!(rewritten.decision, ValidationDecision::Refused);
    assert_eq!(rewritten.refusal_reason, Some(RefusalReason::Other));
    assert_eq!(rewritten.agent_id, "admin-1");

    let history = fx.state.overrides.history(v.id).await.unwrap();
    let original = history[0].original_validation.as_ref().unwrap();
    assert_eq!(original.decision, ValidationDecision::Validated);
}

#[tokio::test]
async fn test_override_records_reject_update_and_delete() {
    let fx = setup().await;
    let v = fx.issued_voucher().await;
    fx.state
        .overrides
        .apply(correction(v.id, VoucherStatus::Cancelled), &admin())
        .await
        .unwrap();

    let update = sqlx::query("UPDATE status_overrides SET reason = 'rewritten after the fact'")
        .execute(&fx.state.db.pool)
        .await;
    assert!(update.is_err());
    let delete = sqlx::query("DELETE FROM status_overrides")
        .execute(&fx.state.db.pool)
        .await;
    assert!(delete.is_err());

    let history = fx.state.overrides.history(v.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].reason, "Agent confirmed the goods were presented");
}

#[tokio::test]
async fn test_failed_notification_does_not_undo_override() {
    let fx = setup_with_notifier(Arc::new(MerchantChannelDown)).await;
    let v = fx.validated_voucher().await;

    let outcome = fx
        .state
        .overrides
        .apply(correction(v.id, VoucherStatus::Refused), &admin())
        .await
        .unwrap();
    assert!(outcome.success);
    // 只有海关人员收到，商户通道失败
    assert_eq!(outcome.notifications_sent.len(), 1);
    assert_eq!(outcome.notifications_sent[0].kind, RecipientKind::Agent);
    assert_eq!(outcome.notifications_sent[0].recipient_id, "agent-1");

    assert_eq!(
        fx.state.vouchers.get(v.id).await.unwrap().status,
        VoucherStatus::Refused
    );
    let history = fx.state.overrides.history(v.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].notifications.len(), 2);
    assert!(
        history[0]
            .notifications
            .iter()
            .any(|t| t.kind == RecipientKind::Merchant)
    );
}

#[tokio::test]
async fn test_override_to_issued_signs_token() {
    let fx = setup().await;
    let inv = fx.invoice().await;
    let created = fx
        .state
        .vouchers
        .create(voucher_request(inv.id, "P7654321"), &fx.merchant_user())
        .await
        .unwrap();
    assert!(created.token_payload.is_none());

    fx.state
        .overrides
        .apply(correction(created.id, VoucherStatus::Issued), &admin())
        .await
        .unwrap();

    let forced = fx.state.vouchers.get(created.id).await.unwrap();
    assert_eq!(forced.status, VoucherStatus::Issued);
    assert!(forced.issued_at.is_some());
    let token = forced.scan_token().unwrap();
    assert!(fx.state.vouchers.signer().verify(&token));

    // 已有令牌，issue 幂等返回
    let again = fx
        .state
        .vouchers
        .issue(created.id, &fx.merchant_user())
        .await
        .unwrap();
    assert_eq!(again.token_signature, forced.token_signature);

    let scanned = fx
        .state
        .vouchers
        .scan(
            &ScanRequest {
                token: Some(token),
                voucher_number: None,
            },
            &agent("agent-1"),
        )
        .await
        .unwrap();
    assert_eq!(scanned.voucher.id, created.id);
    assert!(scanned.can_validate);
}
