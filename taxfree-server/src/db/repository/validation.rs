//! Validation Repository
//!
//! `validations.voucher_id` is UNIQUE: [`insert`] is the single point of
//! truth for "at most one decision per voucher".

use shared::models::Validation;
use sqlx::SqliteConnection;

use super::RepoResult;

const SELECT: &str = "SELECT id, voucher_id, decision, refusal_reason, refusal_details, physical_control_done, control_notes, agent_id, agent_name, exit_point_id, decided_at, is_offline, offline_batch_id, offline_timestamp, synced_at FROM validations";

pub async fn find_by_voucher(
    conn: &mut SqliteConnection,
    voucher_id: i64,
) -> RepoResult<Option<Validation>> {
    let validation = sqlx::query_as::<_, Validation>(&format!("{SELECT} WHERE voucher_id = ?"))
        .bind(voucher_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(validation)
}

/// Insert a decision; a second one for the same voucher is
/// [`RepoError::Duplicate`](super::RepoError::Duplicate)
pub async fn insert(conn: &mut SqliteConnection, v: &Validation) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO validations (id, voucher_id, decision, refusal_reason, refusal_details, physical_control_done, control_notes, agent_id, agent_name, exit_point_id, decided_at, is_offline, offline_batch_id, offline_timestamp, synced_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(v.id)
    .bind(v.voucher_id)
    .bind(v.decision)
    .bind(v.refusal_reason)
    .bind(&v.refusal_details)
    .bind(v.physical_control_done)
    .bind(&v.control_notes)
    .bind(&v.agent_id)
    .bind(&v.agent_name)
    .bind(&v.exit_point_id)
    .bind(v.decided_at)
    .bind(v.is_offline)
    .bind(&v.offline_batch_id)
    .bind(v.offline_timestamp)
    .bind(v.synced_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Insert or rewrite the decision of a voucher (administrative override)
///
/// An existing row keeps its id and offline provenance.
pub async fn upsert(conn: &mut SqliteConnection, v: &Validation) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO validations (id, voucher_id, decision, refusal_reason, refusal_details, physical_control_done, control_notes, agent_id, agent_name, exit_point_id, decided_at, is_offline, offline_batch_id, offline_timestamp, synced_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 0, NULL, NULL, NULL) \
         ON CONFLICT(voucher_id) DO UPDATE SET decision = excluded.decision, refusal_reason = excluded.refusal_reason, refusal_details = excluded.refusal_details, control_notes = excluded.control_notes, agent_id = excluded.agent_id, agent_name = excluded.agent_name, decided_at = excluded.decided_at",
    )
    .bind(v.id)
    .bind(v.voucher_id)
    .bind(v.decision)
    .bind(v.refusal_reason)
    .bind(&v.refusal_details)
    .bind(v.physical_control_done)
    .bind(&v.control_notes)
    .bind(&v.agent_id)
    .bind(&v.agent_name)
    .bind(&v.exit_point_id)
    .bind(v.decided_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Remove the decision of a voucher being reopened
pub async fn delete_by_voucher(conn: &mut SqliteConnection, voucher_id: i64) -> RepoResult<bool> {
    let rows = sqlx::query("DELETE FROM validations WHERE voucher_id = ?")
        .bind(voucher_id)
        .execute(&mut *conn)
        .await?;
    Ok(rows.rows_affected() > 0)
}
