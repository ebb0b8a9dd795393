//! 海关人员班次
//!
//! `ACTIVE → PAUSED → ACTIVE → … → ENDED`。每个人员同时最多一个未结束班次
//! （部分唯一索引保证）。结束时按时间窗口统计该人员的决定。

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use shared::models::{Shift, ShiftStatus, ValidationDecision};
use shared::util::now_millis;
use shared::{AppError, AppResult, ErrorCode};
use sqlx::SqliteConnection;

use crate::audit::{AuditAction, AuditEvent, AuditStorage};
use crate::auth::CurrentUser;
use crate::db::DbService;
use crate::db::repository::shift::{self, ShiftStats};
use crate::db::repository::RepoError;
use crate::utils::validation::{MAX_NOTE_LEN, validate_optional_text};

/// Open shift with its live worked time
#[derive(Debug, Clone, Serialize)]
pub struct ShiftView {
    #[serde(flatten)]
    pub shift: Shift,
    pub net_duration_ms: i64,
}

#[derive(Clone, Debug)]
pub struct ShiftTracker {
    db: DbService,
}

impl ShiftTracker {
    pub fn new(db: DbService) -> Self {
        Self { db }
    }

    pub async fn start(&self, actor: &CurrentUser, notes: Option<String>) -> AppResult<Shift> {
        let exit_point = actor.require_exit_point()?.to_string();
        validate_optional_text(&notes, "notes", MAX_NOTE_LEN)?;

        let now = now_millis();
        let mut tx = self.db.begin_write().await?;
        let started = match shift::create(
            &mut tx,
            &actor.id,
            &actor.name,
            &exit_point,
            notes.as_deref(),
            now,
        )
        .await
        {
            Ok(s) => s,
            Err(RepoError::Duplicate(_)) => {
                return Err(AppError::new(ErrorCode::ShiftAlreadyOpen)
                    .with_detail("agent_id", actor.id.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        AuditStorage::append_in(
            &mut tx,
            AuditEvent::new(AuditAction::ShiftStarted, "shift", started.id)
                .actor(&actor.id, &actor.name)
                .metadata(json!({ "exit_point_id": exit_point })),
        )
        .await?;
        tx.commit().await?;

        tracing::info!(shift_id = started.id, agent_id = %actor.id, exit_point_id = %exit_point, "Shift started");
        Ok(started)
    }

    pub async fn pause(&self, shift_id: i64, actor: &CurrentUser) -> AppResult<Shift> {
        self.transition(shift_id, actor, AuditAction::ShiftPaused).await
    }

    pub async fn resume(&self, shift_id: i64, actor: &CurrentUser) -> AppResult<Shift> {
        self.transition(shift_id, actor, AuditAction::ShiftResumed).await
    }

    /// End the shift and compute its statistics
    pub async fn end(
        &self,
        shift_id: i64,
        actor: &CurrentUser,
        notes: Option<String>,
    ) -> AppResult<Shift> {
        validate_optional_text(&notes, "notes", MAX_NOTE_LEN)?;

        let now = now_millis();
        let mut tx = self.db.begin_write().await?;
        let current = load_own_shift(&mut tx, shift_id, actor).await?;
        if current.status == ShiftStatus::Ended {
            return Err(shift_invalid_status(&current, "end"));
        }

        let decisions =
            shift::decisions_in_window(&mut tx, &current.agent_id, current.started_at, now).await?;
        let stats = compute_stats(&decisions);
        if !shift::end(&mut tx, shift_id, now, &stats, notes.as_deref()).await? {
            return Err(shift_invalid_status(&current, "end"));
        }
        let ended = load_own_shift(&mut tx, shift_id, actor).await?;
        AuditStorage::append_in(
            &mut tx,
            AuditEvent::new(AuditAction::ShiftEnded, "shift", shift_id)
                .actor(&actor.id, &actor.name)
                .metadata(json!({
                    "validations_count": stats.validations_count,
                    "validated_count": stats.validated_count,
                    "refused_count": stats.refused_count,
                    "control_count": stats.control_count,
                    "total_amount_validated": stats.total_amount_validated,
                    "net_duration_ms": ended.net_duration_ms(now),
                })),
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            shift_id,
            agent_id = %ended.agent_id,
            validations = stats.validations_count,
            "Shift ended"
        );
        Ok(ended)
    }

    /// The agent's open shift, if any
    pub async fn current(&self, agent_id: &str) -> AppResult<Option<ShiftView>> {
        let mut conn = self.db.conn().await?;
        let now = now_millis();
        Ok(shift::find_open_by_agent(&mut conn, agent_id)
            .await?
            .map(|s| ShiftView {
                net_duration_ms: s.net_duration_ms(now),
                shift: s,
            }))
    }

    pub async fn list(&self, agent_id: &str, limit: i64, offset: i64) -> AppResult<Vec<Shift>> {
        let mut conn = self.db.conn().await?;
        Ok(shift::list_by_agent(&mut conn, agent_id, limit, offset).await?)
    }

    async fn transition(
        &self,
        shift_id: i64,
        actor: &CurrentUser,
        action: AuditAction,
    ) -> AppResult<Shift> {
        let now = now_millis();
        let mut tx = self.db.begin_write().await?;
        let current = load_own_shift(&mut tx, shift_id, actor).await?;

        let (applied, verb) = match action {
            AuditAction::ShiftPaused => (shift::pause(&mut tx, shift_id, now).await?, "pause"),
            _ => (shift::resume(&mut tx, shift_id, now).await?, "resume"),
        };
        if !applied {
            return Err(shift_invalid_status(&current, verb));
        }
        let updated = load_own_shift(&mut tx, shift_id, actor).await?;
        AuditStorage::append_in(
            &mut tx,
            AuditEvent::new(action, "shift", shift_id)
                .actor(&actor.id, &actor.name)
                .metadata(json!({ "total_pause_ms": updated.total_pause_ms })),
        )
        .await?;
        tx.commit().await?;

        tracing::info!(shift_id, agent_id = %updated.agent_id, action = %action, "Shift updated");
        Ok(updated)
    }
}

/// 统计结束班次时间窗口内的决定
pub fn compute_stats(decisions: &[(ValidationDecision, Decimal)]) -> ShiftStats {
    let mut stats = ShiftStats {
        validations_count: decisions.len() as i64,
        ..ShiftStats::default()
    };
    for (decision, amount) in decisions {
        match decision {
            ValidationDecision::Validated => {
                stats.validated_count += 1;
                stats.total_amount_validated += *amount;
            }
            ValidationDecision::Refused => stats.refused_count += 1,
            ValidationDecision::ControlRequired => stats.control_count += 1,
        }
    }
    stats
}

/// 只能操作自己的班次（管理员除外）
async fn load_own_shift(
    conn: &mut SqliteConnection,
    shift_id: i64,
    actor: &CurrentUser,
) -> AppResult<Shift> {
    let found = shift::find_by_id(conn, shift_id)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::ShiftNotFound).with_detail("shift_id", shift_id))?;
    if found.agent_id != actor.id && !actor.is_admin() {
        return Err(AppError::permission_denied("Shift belongs to another agent"));
    }
    Ok(found)
}

fn shift_invalid_status(current: &Shift, operation: &str) -> AppError {
    AppError::with_message(
        ErrorCode::ShiftInvalidStatus,
        format!("Cannot {operation} shift {} in status {:?}", current.id, current.status),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_stats() {
        let decisions = vec![
            (ValidationDecision::Validated, Decimal::from(14_000)),
            (ValidationDecision::Validated, Decimal::new(25050, 1)),
            (ValidationDecision::Refused, Decimal::from(9_000)),
            (ValidationDecision::ControlRequired, Decimal::from(1_000)),
        ];
        let stats = compute_stats(&decisions);
        assert_eq!(stats.validations_count, 4);
        assert_eq!(stats.validated_count, 2);
        assert_eq!(stats.refused_count, 1);
        assert_eq!(stats.control_count, 1);
        assert_eq!(stats.total_amount_validated, Decimal::new(165050, 1));
    }

    #[test]
    fn test_compute_stats_empty() {
        assert_eq!(compute_stats(&[]), ShiftStats::default());
    }
}
