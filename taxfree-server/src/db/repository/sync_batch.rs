//! Offline Sync Batch Repository

use shared::models::{OfflineSyncBatch, SyncItemError};
use sqlx::SqliteConnection;

use super::{RepoError, RepoResult, page, parse_json, to_json};

#[derive(sqlx::FromRow)]
struct BatchRow {
    id: i64,
    batch_id: String,
    agent_id: String,
    exit_point_id: String,
    submitted_count: i64,
    successful_count: i64,
    failed_count: i64,
    errors: String,
    synced_at: i64,
}

impl TryFrom<BatchRow> for OfflineSyncBatch {
    type Error = RepoError;

    fn try_from(r: BatchRow) -> RepoResult<Self> {
        Ok(OfflineSyncBatch {
            id: r.id,
            batch_id: r.batch_id,
            agent_id: r.agent_id,
            exit_point_id: r.exit_point_id,
            submitted_count: r.submitted_count,
            successful_count: r.successful_count,
            failed_count: r.failed_count,
            errors: parse_json::<Vec<SyncItemError>>(&r.errors, "offline_sync_batches.errors")?,
            synced_at: r.synced_at,
        })
    }
}

pub async fn insert(conn: &mut SqliteConnection, b: &OfflineSyncBatch) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO offline_sync_batches (id, batch_id, agent_id, exit_point_id, submitted_count, successful_count, failed_count, errors, synced_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(b.id)
    .bind(&b.batch_id)
    .bind(&b.agent_id)
    .bind(&b.exit_point_id)
    .bind(b.submitted_count)
    .bind(b.successful_count)
    .bind(b.failed_count)
    .bind(to_json(&b.errors)?)
    .bind(b.synced_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Batches an agent submitted, newest first
pub async fn list_by_agent(
    conn: &mut SqliteConnection,
    agent_id: &str,
    limit: i64,
    offset: i64,
) -> RepoResult<Vec<OfflineSyncBatch>> {
    let (limit, offset) = page(limit, offset);
    sqlx::query_as::<_, BatchRow>(
        "SELECT id, batch_id, agent_id, exit_point_id, submitted_count, successful_count, failed_count, errors, synced_at FROM offline_sync_batches WHERE agent_id = ? ORDER BY synced_at DESC, id DESC LIMIT ? OFFSET ?",
    )
    .bind(agent_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(OfflineSyncBatch::try_from)
    .collect()
}
