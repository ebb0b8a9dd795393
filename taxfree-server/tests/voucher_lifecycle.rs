//! Voucher lifecycle: creation, issue, scan, decisions, cancel, refunds

mod common;

use common::{admin, agent, line, operator, setup, setup_with_params, voucher_request};
use rust_decimal::Decimal;
use shared::ErrorCode;
use shared::models::{
    CheckCode, DecisionInput, RefundMethod, RefundStatus, RefusalReason, RuleParams,
    ScanRequest, ValidationDecision, VoucherStatus,
};

#[tokio::test]
async fn test_create_computes_amounts_and_freezes_rules() {
    let fx = setup().await;
    let inv = fx.invoice().await;

    let v = fx
        .state
        .vouchers
        .create(voucher_request(inv.id, "P1234567"), &fx.merchant_user())
        .await
        .unwrap();

    assert_eq!(v.status, VoucherStatus::Created);
    assert_eq!(v.eligible_amount, Decimal::from(100_000));
    assert_eq!(v.vat_amount, Decimal::from(16_000));
    // 15% operator fee
    assert_eq!(v.operator_fee, Decimal::from(2_400));
    assert_eq!(v.refund_amount, Decimal::from(13_600));
    assert_eq!(v.rule_snapshot.version, "2026.1");
    assert_eq!(v.voucher_number.len(), 14);
    assert!(!v.requires_control);
    assert!(v.token_payload.is_none());
}

#[tokio::test]
async fn test_second_voucher_for_invoice_rejected() {
    let fx = setup().await;
    let inv = fx.invoice().await;
    let user = fx.merchant_user();

    fx.state
        .vouchers
        .create(voucher_request(inv.id, "P1234567"), &user)
        .await
        .unwrap();
    let err = fx
        .state
        .vouchers
        .create(voucher_request(inv.id, "P1234567"), &user)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::VoucherAlreadyExists);
}

#[tokio::test]
async fn test_ineligible_purchase_lists_failed_checks() {
    let fx = setup().await;
    // below the 50 000 minimum
    let inv = fx
        .invoice_with(Decimal::from(10_000), Decimal::from(1_600))
        .await;

    let err = fx
        .state
        .vouchers
        .create(voucher_request(inv.id, "P1234567"), &fx.merchant_user())
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::VoucherNotEligible);
    let failed = &err.details.unwrap()["failed_checks"];
    assert_eq!(failed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_minimum_applies_to_eligible_lines_only() {
    let fx = setup().await;
    // 发票总额 60 000 超过下限，但可退税部分只有 30 000
    let inv = fx
        .invoice_with_items(vec![
            line("ELECTRONICS", Decimal::from(30_000), Decimal::from(4_800), true),
            line("SERVICES", Decimal::from(30_000), Decimal::from(4_800), false),
        ])
        .await;
    assert_eq!(inv.total_amount, Decimal::from(60_000));

    let err = fx
        .state
        .vouchers
        .create(voucher_request(inv.id, "P1234567"), &fx.merchant_user())
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::VoucherNotEligible);
    let failed = err.details.unwrap()["failed_checks"].clone();
    let failed = failed.as_array().unwrap();
    assert_eq!(failed.len(), 1);
    assert!(failed[0].as_str().unwrap().contains("Eligible amount 30000"));
}

#[tokio::test]
async fn test_high_value_flag_counts_whole_invoice() {
    let fx = setup_with_params(RuleParams {
        high_value_threshold: Decimal::from(150_000),
        ..RuleParams::default()
    })
    .await;
    let inv = fx
        .invoice_with_items(vec![
            line("ELECTRONICS", Decimal::from(100_000), Decimal::from(16_000), true),
            line("SERVICES", Decimal::from(60_000), Decimal::from(9_600), false),
        ])
        .await;

    let v = fx
        .state
        .vouchers
        .create(voucher_request(inv.id, "P1234567"), &fx.merchant_user())
        .await
        .unwrap();
    assert_eq!(v.eligible_amount, Decimal::from(100_000));
    assert!(v.risk_flags.iter().any(|f| f == "HIGH_VALUE"));
    assert_eq!(v.risk_score, 20);
    // 强制查验仍按可退税金额判断
    assert!(!v.requires_control);
}

#[tokio::test]
async fn test_high_value_voucher_requires_control() {
    let fx = setup_with_params(RuleParams {
        high_value_threshold: Decimal::from(80_000),
        ..RuleParams::default()
    })
    .await;
    let inv = fx.invoice().await;

    let v = fx
        .state
        .vouchers
        .create(voucher_request(inv.id, "P1234567"), &fx.merchant_user())
        .await
        .unwrap();
    assert!(v.requires_control);
    assert!(v.risk_flags.iter().any(|f| f == "HIGH_VALUE"));
}

#[tokio::test]
async fn test_issue_is_idempotent() {
    let fx = setup().await;
    let issued = fx.issued_voucher().await;
    assert_eq!(issued.status, VoucherStatus::Issued);
    assert!(issued.token_signature.is_some());

    let again = fx
        .state
        .vouchers
        .issue(issued.id, &fx.merchant_user())
        .await
        .unwrap();
    assert_eq!(again.issued_at, issued.issued_at);
    assert_eq!(again.token_signature, issued.token_signature);
}

#[tokio::test]
async fn test_scan_by_token() {
    let fx = setup().await;
    let issued = fx.issued_voucher().await;

    let result = fx
        .state
        .vouchers
        .scan(
            &ScanRequest {
                token: issued.scan_token(),
                voucher_number: None,
            },
            &agent("agent-1"),
        )
        .await
        .unwrap();
    assert_eq!(result.voucher.id, issued.id);
    assert!(result.can_validate);
    assert!(
        result
            .report
            .checks
            .iter()
            .any(|c| c.code == CheckCode::NotProcessed)
    );
}

#[tokio::test]
async fn test_scan_rejects_tampered_token() {
    let fx = setup().await;
    let issued = fx.issued_voucher().await;
    let token = issued.scan_token().unwrap();
    let tampered = token.replacen(&issued.voucher_number, "202601ZZZZZZZZ", 1);

    let err = fx
        .state
        .vouchers
        .scan(
            &ScanRequest {
                token: Some(tampered),
                voucher_number: None,
            },
            &agent("agent-1"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ScanTokenInvalid);
}

#[tokio::test]
async fn test_scan_after_decision_is_blocked() {
    let fx = setup().await;
    let v = fx.validated_voucher().await;

    let result = fx
        .state
        .vouchers
        .scan(
            &ScanRequest {
                token: None,
                voucher_number: Some(v.voucher_number.clone()),
            },
            &agent("agent-2"),
        )
        .await
        .unwrap();
    assert!(!result.can_validate);
    assert!(
        result
            .report
            .checks
            .iter()
            .any(|c| c.code == CheckCode::AlreadyProcessed)
    );
}

#[tokio::test]
async fn test_decision_validates_voucher() {
    let fx = setup().await;
    let v = fx.validated_voucher().await;
    assert_eq!(v.status, VoucherStatus::Validated);
    assert!(v.validated_at.is_some());

    let recorded = fx.state.vouchers.validation_of(v.id).await.unwrap().unwrap();
    assert_eq!(recorded.decision, ValidationDecision::Validated);
    assert_eq!(recorded.exit_point_id.as_deref(), Some("AIBD"));
    assert!(!recorded.is_offline);
}

#[tokio::test]
async fn test_concurrent_decisions_only_one_wins() {
    let fx = setup().await;
    let v = fx.issued_voucher().await;
    let a1 = agent("agent-1");
    let a2 = agent("agent-2");

    let (first, second) = tokio::join!(
        fx.state
            .vouchers
            .record_decision(v.id, DecisionInput::validated(), &a1),
        fx.state.vouchers.record_decision(
            v.id,
            DecisionInput::refused(RefusalReason::GoodsNotPresent),
            &a2
        ),
    );

    let outcomes = [first, second];
    let wins = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1);
    let loser = outcomes.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert_eq!(loser.code, ErrorCode::AlreadyValidated);
    assert!(
        loser
            .details
            .as_ref()
            .is_some_and(|d| d.contains_key("server_validation"))
    );
}

#[tokio::test]
async fn test_refusal_requires_reason() {
    let fx = setup().await;
    let v = fx.issued_voucher().await;
    let input = DecisionInput {
        decision: ValidationDecision::Refused,
        ..DecisionInput::validated()
    };

    let err = fx
        .state
        .vouchers
        .record_decision(v.id, input, &agent("agent-1"))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::RefusalReasonRequired);

    let err = fx
        .state
        .vouchers
        .record_decision(
            v.id,
            DecisionInput {
                refusal_reason: Some(RefusalReason::Other),
                ..DecisionInput::validated()
            },
            &agent("agent-1"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::RefusalReasonNotAllowed);
}

#[tokio::test]
async fn test_control_required_keeps_voucher_pending() {
    let fx = setup().await;
    let v = fx.issued_voucher().await;

    fx.state
        .vouchers
        .record_decision(v.id, DecisionInput::control_required(), &agent("agent-1"))
        .await
        .unwrap();
    let after = fx.state.vouchers.get(v.id).await.unwrap();
    assert_eq!(after.status, VoucherStatus::ValidationPending);
    assert!(after.validated_at.is_none());
}

#[tokio::test]
async fn test_decision_requires_exit_point() {
    let fx = setup().await;
    let v = fx.issued_voucher().await;
    let mut roaming = agent("agent-1");
    roaming.exit_point_id = None;

    let err = fx
        .state
        .vouchers
        .record_decision(v.id, DecisionInput::validated(), &roaming)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ExitPointRequired);
}

#[tokio::test]
async fn test_cancel_only_before_decision() {
    let fx = setup().await;
    let issued = fx.issued_voucher().await;

    let cancelled = fx
        .state
        .vouchers
        .cancel(issued.id, "Customer changed their mind", &fx.merchant_user())
        .await
        .unwrap();
    assert_eq!(cancelled.status, VoucherStatus::Cancelled);
    assert_eq!(cancelled.cancelled_by.as_deref(), Some("merchant-user-1"));

    let validated = fx.validated_voucher().await;
    let err = fx
        .state
        .vouchers
        .cancel(validated.id, "Too late", &admin())
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::VoucherInvalidStatus);
}

#[tokio::test]
async fn test_refund_flow() {
    let fx = setup().await;
    let v = fx.validated_voucher().await;
    let op = operator();

    let refund = fx
        .state
        .refunds
        .initiate(v.id, RefundMethod::MobileMoney, &op)
        .await
        .unwrap();
    assert_eq!(refund.status, RefundStatus::Pending);
    assert_eq!(refund.net_amount, v.refund_amount);

    let err = fx
        .state
        .refunds
        .initiate(v.id, RefundMethod::Cash, &op)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::RefundAlreadyExists);

    let paid = fx.state.refunds.mark_paid(refund.id, &op).await.unwrap();
    assert_eq!(paid.status, RefundStatus::Paid);
    assert!(paid.paid_at.is_some());
    let after = fx.state.vouchers.get(v.id).await.unwrap();
    assert_eq!(after.status, VoucherStatus::Refunded);

    let err = fx.state.refunds.mark_paid(refund.id, &op).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::RefundAlreadyPaid);
}

#[tokio::test]
async fn test_refund_needs_validated_voucher() {
    let fx = setup().await;
    let v = fx.issued_voucher().await;

    let err = fx
        .state
        .refunds
        .initiate(v.id, RefundMethod::Card, &operator())
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::VoucherInvalidStatus);
}

#[tokio::test]
async fn test_every_mutation_is_audited() {
    let fx = setup().await;
    fx.validated_voucher().await;

    let (entries, total) = fx
        .state
        .audit
        .list(&taxfree_server::audit::AuditQuery::default())
        .await
        .unwrap();
    // created, issued, validated
    assert_eq!(total, 3);
    assert_eq!(entries.len(), 3);
    assert!(fx.state.audit.verify_chain().await.unwrap().valid);
}

#[tokio::test]
async fn test_cancelled_invoice_rejected() {
    let fx = setup().await;
    let inv = fx.invoice().await;
    {
        let mut tx = fx.state.db.begin_write().await.unwrap();
        taxfree_server::db::repository::invoice::cancel(&mut tx, inv.id)
            .await
            .unwrap();
        tx.commit().await.unwrap();
    }

    let err = fx
        .state
        .vouchers
        .create(voucher_request(inv.id, "P1234567"), &fx.merchant_user())
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvoiceCancelled);
}
