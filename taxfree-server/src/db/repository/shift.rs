//! Shift Repository

use rust_decimal::Decimal;
use shared::models::{Shift, ShiftStatus, ValidationDecision};
use sqlx::SqliteConnection;

use super::{RepoError, RepoResult, page, parse_decimal};

#[derive(sqlx::FromRow)]
struct ShiftRow {
    id: i64,
    agent_id: String,
    agent_name: String,
    exit_point_id: String,
    status: ShiftStatus,
    started_at: i64,
    ended_at: Option<i64>,
    last_pause_at: Option<i64>,
    total_pause_ms: i64,
    validations_count: i64,
    validated_count: i64,
    refused_count: i64,
    control_count: i64,
    total_amount_validated: String,
    notes: Option<String>,
}

impl TryFrom<ShiftRow> for Shift {
    type Error = RepoError;

    fn try_from(r: ShiftRow) -> RepoResult<Self> {
        Ok(Shift {
            id: r.id,
            agent_id: r.agent_id,
            agent_name: r.agent_name,
            exit_point_id: r.exit_point_id,
            status: r.status,
            started_at: r.started_at,
            ended_at: r.ended_at,
            last_pause_at: r.last_pause_at,
            total_pause_ms: r.total_pause_ms,
            validations_count: r.validations_count,
            validated_count: r.validated_count,
            refused_count: r.refused_count,
            control_count: r.control_count,
            total_amount_validated: parse_decimal(
                &r.total_amount_validated,
                "shifts.total_amount_validated",
            )?,
            notes: r.notes,
        })
    }
}

/// Aggregates written when a shift ends
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShiftStats {
    pub validations_count: i64,
    pub validated_count: i64,
    pub refused_count: i64,
    pub control_count: i64,
    pub total_amount_validated: Decimal,
}

const SELECT: &str = "SELECT id, agent_id, agent_name, exit_point_id, status, started_at, ended_at, last_pause_at, total_pause_ms, validations_count, validated_count, refused_count, control_count, total_amount_validated, notes FROM shifts";

pub async fn find_by_id(conn: &mut SqliteConnection, id: i64) -> RepoResult<Option<Shift>> {
    sqlx::query_as::<_, ShiftRow>(&format!("{SELECT} WHERE id = ?"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .map(Shift::try_from)
        .transpose()
}

/// The agent's ACTIVE or PAUSED shift
pub async fn find_open_by_agent(
    conn: &mut SqliteConnection,
    agent_id: &str,
) -> RepoResult<Option<Shift>> {
    sqlx::query_as::<_, ShiftRow>(&format!("{SELECT} WHERE agent_id = ? AND status != 'ENDED'"))
        .bind(agent_id)
        .fetch_optional(&mut *conn)
        .await?
        .map(Shift::try_from)
        .transpose()
}

pub async fn list_by_agent(
    conn: &mut SqliteConnection,
    agent_id: &str,
    limit: i64,
    offset: i64,
) -> RepoResult<Vec<Shift>> {
    let (limit, offset) = page(limit, offset);
    sqlx::query_as::<_, ShiftRow>(&format!(
        "{SELECT} WHERE agent_id = ? ORDER BY started_at DESC LIMIT ? OFFSET ?"
    ))
    .bind(agent_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(Shift::try_from)
    .collect()
}

/// Start a shift; a second open shift for the agent is
/// [`RepoError::Duplicate`]
pub async fn create(
    conn: &mut SqliteConnection,
    agent_id: &str,
    agent_name: &str,
    exit_point_id: &str,
    notes: Option<&str>,
    now: i64,
) -> RepoResult<Shift> {
    let id = shared::util::snowflake_id();
    sqlx::query(
        "INSERT INTO shifts (id, agent_id, agent_name, exit_point_id, status, started_at, notes) VALUES (?, ?, ?, ?, 'ACTIVE', ?, ?)",
    )
    .bind(id)
    .bind(agent_id)
    .bind(agent_name)
    .bind(exit_point_id)
    .bind(now)
    .bind(notes)
    .execute(&mut *conn)
    .await?;

    find_by_id(conn, id)
        .await?
        .ok_or_else(|| RepoError::Database("Failed to create shift".into()))
}

/// `ACTIVE → PAUSED`
pub async fn pause(conn: &mut SqliteConnection, id: i64, now: i64) -> RepoResult<bool> {
    let rows = sqlx::query(
        "UPDATE shifts SET status = 'PAUSED', last_pause_at = ? WHERE id = ? AND status = 'ACTIVE'",
    )
    .bind(now)
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(rows.rows_affected() == 1)
}

/// `PAUSED → ACTIVE`, folding the pause into `total_pause_ms`
pub async fn resume(conn: &mut SqliteConnection, id: i64, now: i64) -> RepoResult<bool> {
    let rows = sqlx::query(
        "UPDATE shifts SET status = 'ACTIVE', total_pause_ms = total_pause_ms + MAX(?1 - COALESCE(last_pause_at, ?1), 0), last_pause_at = NULL WHERE id = ?2 AND status = 'PAUSED'",
    )
    .bind(now)
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(rows.rows_affected() == 1)
}

/// `ACTIVE | PAUSED → ENDED` with final statistics
pub async fn end(
    conn: &mut SqliteConnection,
    id: i64,
    now: i64,
    stats: &ShiftStats,
    notes: Option<&str>,
) -> RepoResult<bool> {
    let rows = sqlx::query(
        "UPDATE shifts SET status = 'ENDED', ended_at = ?1, \
         total_pause_ms = total_pause_ms + CASE WHEN status = 'PAUSED' THEN MAX(?1 - COALESCE(last_pause_at, ?1), 0) ELSE 0 END, \
         last_pause_at = NULL, validations_count = ?2, validated_count = ?3, refused_count = ?4, control_count = ?5, \
         total_amount_validated = ?6, notes = COALESCE(?7, notes) \
         WHERE id = ?8 AND status IN ('ACTIVE', 'PAUSED')",
    )
    .bind(now)
    .bind(stats.validations_count)
    .bind(stats.validated_count)
    .bind(stats.refused_count)
    .bind(stats.control_count)
    .bind(stats.total_amount_validated.to_string())
    .bind(notes)
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(rows.rows_affected() == 1)
}

/// Decisions an agent recorded in `[from, to]`, with the voucher refund amount
pub async fn decisions_in_window(
    conn: &mut SqliteConnection,
    agent_id: &str,
    from: i64,
    to: i64,
) -> RepoResult<Vec<(ValidationDecision, Decimal)>> {
    let rows = sqlx::query_as::<_, (ValidationDecision, String)>(
        "SELECT va.decision, vo.refund_amount FROM validations va JOIN vouchers vo ON vo.id = va.voucher_id WHERE va.agent_id = ? AND va.decided_at BETWEEN ? AND ?",
    )
    .bind(agent_id)
    .bind(from)
    .bind(to)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter()
        .map(|(decision, amount)| Ok((decision, parse_decimal(&amount, "vouchers.refund_amount")?)))
        .collect()
}
