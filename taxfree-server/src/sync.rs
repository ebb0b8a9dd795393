//! 离线同步协调
//!
//! 断网期间的海关决定在恢复连接后整批提交。每一项独立事务：
//! 冲突和错误写入响应体，不影响其余项目。批次本身不做去重。

use serde_json::json;
use shared::models::{
    DecisionInput, OfflineDecision, OfflineSyncBatch, SyncItemError, SyncRequest, SyncResponse,
    ValidationSnapshot,
};
use shared::util::{now_millis, snowflake_id};
use shared::{AppError, AppResult, ErrorCode};

use crate::audit::{AuditAction, AuditEvent, AuditStorage};
use crate::auth::CurrentUser;
use crate::db::DbService;
use crate::db::repository::sync_batch;
use crate::utils::validation::{MAX_SHORT_TEXT_LEN, validate_required_text};
use crate::vouchers::OfflineOrigin;
use crate::vouchers::lifecycle::{record_decision_in, validate_decision_text};

/// Default maximum number of items in one batch
pub const DEFAULT_MAX_BATCH: usize = 500;

#[derive(Clone, Debug)]
pub struct OfflineSyncCoordinator {
    db: DbService,
    max_batch: usize,
}

impl OfflineSyncCoordinator {
    pub fn new(db: DbService, max_batch: usize) -> Self {
        Self { db, max_batch }
    }

    /// Reconcile one offline batch
    pub async fn sync(&self, request: SyncRequest, actor: &CurrentUser) -> AppResult<SyncResponse> {
        let exit_point = actor.require_exit_point()?.to_string();
        validate_required_text(&request.batch_id, "batch_id", MAX_SHORT_TEXT_LEN)?;
        if request.validations.is_empty() {
            return Err(AppError::new(ErrorCode::SyncBatchEmpty));
        }
        if request.validations.len() > self.max_batch {
            return Err(AppError::new(ErrorCode::SyncBatchTooLarge)
                .with_detail("max", self.max_batch)
                .with_detail("submitted", request.validations.len()));
        }

        let batch_id = request.batch_id.trim().to_string();
        let total = request.validations.len();
        let mut errors = Vec::new();

        for item in &request.validations {
            let origin = OfflineOrigin {
                batch_id: batch_id.clone(),
                timestamp: item.offline_timestamp,
            };
            if let Err(e) = self.apply_item(item, actor, &exit_point, &origin).await {
                tracing::debug!(voucher_id = item.voucher_id, code = %e.code, "Offline item rejected");
                errors.push(item_error(item.voucher_id, e));
            }
        }

        let failed = errors.len();
        let successful = total - failed;
        let conflicts = errors.iter().filter(|e| e.is_conflict).count();
        let now = now_millis();
        let record = OfflineSyncBatch {
            id: snowflake_id(),
            batch_id: batch_id.clone(),
            agent_id: actor.id.clone(),
            exit_point_id: exit_point.clone(),
            submitted_count: total as i64,
            successful_count: successful as i64,
            failed_count: failed as i64,
            errors,
            synced_at: now,
        };

        let mut tx = self.db.begin_write().await?;
        sync_batch::insert(&mut tx, &record).await?;
        AuditStorage::append_in(
            &mut tx,
            AuditEvent::new(AuditAction::OfflineSync, "offline_sync_batch", record.id)
                .actor(&actor.id, &actor.name)
                .metadata(json!({
                    "batch_id": batch_id,
                    "exit_point_id": exit_point,
                    "total": total,
                    "successful": successful,
                    "failed": failed,
                    "conflicts": conflicts,
                })),
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            batch_id = %batch_id,
            agent_id = %actor.id,
            total,
            successful,
            failed,
            conflicts,
            "Offline batch synchronized"
        );

        Ok(SyncResponse {
            batch_id,
            total,
            successful,
            failed,
            errors: record.errors,
        })
    }

    /// Batches submitted by an agent, newest first
    pub async fn history(
        &self,
        agent_id: &str,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<OfflineSyncBatch>> {
        let mut conn = self.db.conn().await?;
        Ok(sync_batch::list_by_agent(&mut conn, agent_id, limit, offset).await?)
    }

    async fn apply_item(
        &self,
        item: &OfflineDecision,
        actor: &CurrentUser,
        exit_point: &str,
        origin: &OfflineOrigin,
    ) -> AppResult<()> {
        let input = DecisionInput {
            decision: item.decision,
            refusal_reason: item.refusal_reason,
            refusal_details: item.refusal_details.clone(),
            physical_control_done: item.physical_control_done,
            control_notes: item.control_notes.clone(),
        };
        validate_decision_text(&input)?;

        let now = now_millis();
        let mut tx = self.db.begin_write().await?;
        record_decision_in(&mut tx, item.voucher_id, &input, actor, exit_point, Some(origin), now)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}

fn item_error(voucher_id: i64, err: AppError) -> SyncItemError {
    let is_conflict = err.code == ErrorCode::AlreadyValidated;
    let server_validation = err
        .details
        .as_ref()
        .and_then(|d| d.get("server_validation"))
        .and_then(|v| serde_json::from_value::<ValidationSnapshot>(v.clone()).ok());
    SyncItemError {
        voucher_id,
        error: err.message,
        is_conflict,
        server_validation,
    }
}
