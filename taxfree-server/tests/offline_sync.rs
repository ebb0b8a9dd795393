//! Offline batch reconciliation

mod common;

use common::{agent, setup};
use shared::ErrorCode;
use shared::models::{
    DecisionInput, OfflineDecision, RefusalReason, SyncRequest, ValidationDecision, VoucherStatus,
};

fn offline(voucher_id: i64, decision: ValidationDecision) -> OfflineDecision {
    OfflineDecision {
        voucher_id,
        decision,
        refusal_reason: (decision == ValidationDecision::Refused)
            .then_some(RefusalReason::GoodsMismatch),
        refusal_details: None,
        physical_control_done: true,
        control_notes: None,
        offline_timestamp: 1_767_225_600_000,
    }
}

#[tokio::test]
async fn test_batch_with_conflict_is_partially_applied() {
    let fx = setup().await;
    let v1 = fx.issued_voucher().await;
    let v2 = fx.issued_voucher().await;
    let v3 = fx.issued_voucher().await;

    // v2 decided online while the laptop was offline
    fx.state
        .vouchers
        .record_decision(v2.id, DecisionInput::validated(), &agent("agent-online"))
        .await
        .unwrap();

    let offline_agent = agent("agent-offline");
    let response = fx
        .state
        .sync
        .sync(
            SyncRequest {
                batch_id: "batch-001".into(),
                validations: vec![
                    offline(v1.id, ValidationDecision::Validated),
                    offline(v2.id, ValidationDecision::Refused),
                    offline(v3.id, ValidationDecision::Refused),
                ],
            },
            &offline_agent,
        )
        .await
        .unwrap();

    assert_eq!(response.total, 3);
    assert_eq!(response.successful, 2);
    assert_eq!(response.failed, 1);
    let conflict = &response.errors[0];
    assert_eq!(conflict.voucher_id, v2.id);
    assert!(conflict.is_conflict);
    let server = conflict.server_validation.as_ref().unwrap();
    assert_eq!(server.agent_id, "agent-online");
    assert_eq!(server.decision, ValidationDecision::Validated);

    let first = fx.state.vouchers.validation_of(v1.id).await.unwrap().unwrap();
    assert!(first.is_offline);
    assert_eq!(first.offline_batch_id.as_deref(), Some("batch-001"));
    assert_eq!(first.offline_timestamp, Some(1_767_225_600_000));
    assert!(first.synced_at.is_some());

    assert_eq!(
        fx.state.vouchers.get(v3.id).await.unwrap().status,
        VoucherStatus::Refused
    );

    let history = fx
        .state
        .sync
        .history(&offline_agent.id, 10, 0)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].successful_count, 2);
    assert_eq!(history[0].failed_count, 1);
}

#[tokio::test]
async fn test_resubmitted_batch_only_reports_conflicts() {
    let fx = setup().await;
    let v1 = fx.issued_voucher().await;
    let v2 = fx.issued_voucher().await;
    let offline_agent = agent("agent-offline");
    let batch = || SyncRequest {
        batch_id: "batch-retry".into(),
        validations: vec![
            offline(v1.id, ValidationDecision::Validated),
            offline(v2.id, ValidationDecision::Refused),
        ],
    };

    let first = fx.state.sync.sync(batch(), &offline_agent).await.unwrap();
    assert_eq!(first.successful, 2);

    // 客户端未收到响应后重发同一批次
    let second = fx.state.sync.sync(batch(), &offline_agent).await.unwrap();
    assert_eq!(second.total, 2);
    assert_eq!(second.successful, 0);
    assert_eq!(second.failed, 2);
    assert!(second.errors.iter().all(|e| e.is_conflict));
    let echoed = second.errors[0].server_validation.as_ref().unwrap();
    assert_eq!(echoed.agent_id, "agent-offline");

    // 决定不被重复写入
    let kept = fx.state.vouchers.validation_of(v2.id).await.unwrap().unwrap();
    assert_eq!(kept.decision, ValidationDecision::Refused);
    assert_eq!(
        fx.state.vouchers.get(v1.id).await.unwrap().status,
        VoucherStatus::Validated
    );

    let history = fx
        .state
        .sync
        .history(&offline_agent.id, 10, 0)
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|b| b.batch_id == "batch-retry"));
    assert!(
        history
            .iter()
            .any(|b| b.successful_count == 0 && b.failed_count == 2)
    );
}

#[tokio::test]
async fn test_unknown_voucher_is_an_item_error() {
    let fx = setup().await;

    let response = fx
        .state
        .sync
        .sync(
            SyncRequest {
                batch_id: "batch-002".into(),
                validations: vec![offline(42, ValidationDecision::Validated)],
            },
            &agent("agent-1"),
        )
        .await
        .unwrap();
    assert_eq!(response.failed, 1);
    assert!(!response.errors[0].is_conflict);
    assert!(response.errors[0].server_validation.is_none());
}

#[tokio::test]
async fn test_empty_batch_rejected() {
    let fx = setup().await;

    let err = fx
        .state
        .sync
        .sync(
            SyncRequest {
                batch_id: "batch-003".into(),
                validations: Vec::new(),
            },
            &agent("agent-1"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::SyncBatchEmpty);
}
