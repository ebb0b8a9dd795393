//! Refund Repository

use shared::models::{Refund, RefundMethod, RefundStatus};
use sqlx::SqliteConnection;

use super::{RepoError, RepoResult, parse_decimal};

#[derive(sqlx::FromRow)]
struct RefundRow {
    id: i64,
    voucher_id: i64,
    status: RefundStatus,
    method: RefundMethod,
    currency: String,
    gross_amount: String,
    operator_fee: String,
    net_amount: String,
    initiated_by: String,
    paid_at: Option<i64>,
    failure_reason: Option<String>,
    cancelled_at: Option<i64>,
    cancellation_reason: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<RefundRow> for Refund {
    type Error = RepoError;

    fn try_from(r: RefundRow) -> RepoResult<Self> {
        Ok(Refund {
            id: r.id,
            voucher_id: r.voucher_id,
            status: r.status,
            method: r.method,
            currency: r.currency,
            gross_amount: parse_decimal(&r.gross_amount, "refunds.gross_amount")?,
            operator_fee: parse_decimal(&r.operator_fee, "refunds.operator_fee")?,
            net_amount: parse_decimal(&r.net_amount, "refunds.net_amount")?,
            initiated_by: r.initiated_by,
            paid_at: r.paid_at,
            failure_reason: r.failure_reason,
            cancelled_at: r.cancelled_at,
            cancellation_reason: r.cancellation_reason,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

const SELECT: &str = "SELECT id, voucher_id, status, method, currency, gross_amount, operator_fee, net_amount, initiated_by, paid_at, failure_reason, cancelled_at, cancellation_reason, created_at, updated_at FROM refunds";

pub async fn find_by_id(conn: &mut SqliteConnection, id: i64) -> RepoResult<Option<Refund>> {
    sqlx::query_as::<_, RefundRow>(&format!("{SELECT} WHERE id = ?"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .map(Refund::try_from)
        .transpose()
}

pub async fn find_by_voucher(
    conn: &mut SqliteConnection,
    voucher_id: i64,
) -> RepoResult<Option<Refund>> {
    sqlx::query_as::<_, RefundRow>(&format!("{SELECT} WHERE voucher_id = ?"))
        .bind(voucher_id)
        .fetch_optional(&mut *conn)
        .await?
        .map(Refund::try_from)
        .transpose()
}

/// Insert a refund; one per voucher
pub async fn insert(conn: &mut SqliteConnection, r: &Refund) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO refunds (id, voucher_id, status, method, currency, gross_amount, operator_fee, net_amount, initiated_by, paid_at, failure_reason, cancelled_at, cancellation_reason, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(r.id)
    .bind(r.voucher_id)
    .bind(r.status)
    .bind(r.method)
    .bind(&r.currency)
    .bind(r.gross_amount.to_string())
    .bind(r.operator_fee.to_string())
    .bind(r.net_amount.to_string())
    .bind(&r.initiated_by)
    .bind(r.paid_at)
    .bind(&r.failure_reason)
    .bind(r.cancelled_at)
    .bind(&r.cancellation_reason)
    .bind(r.created_at)
    .bind(r.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// `FAILED | CANCELLED → PENDING` with a fresh method and amounts
pub async fn reopen(conn: &mut SqliteConnection, r: &Refund) -> RepoResult<bool> {
    let rows = sqlx::query(
        "UPDATE refunds SET status = 'PENDING', method = ?1, gross_amount = ?2, operator_fee = ?3, net_amount = ?4, initiated_by = ?5, paid_at = NULL, failure_reason = NULL, cancelled_at = NULL, cancellation_reason = NULL, updated_at = ?6 WHERE voucher_id = ?7 AND status IN ('FAILED', 'CANCELLED')",
    )
    .bind(r.method)
    .bind(r.gross_amount.to_string())
    .bind(r.operator_fee.to_string())
    .bind(r.net_amount.to_string())
    .bind(&r.initiated_by)
    .bind(r.updated_at)
    .bind(r.voucher_id)
    .execute(&mut *conn)
    .await?;
    Ok(rows.rows_affected() == 1)
}

/// `PENDING | INITIATED → PAID`
pub async fn mark_paid(conn: &mut SqliteConnection, id: i64, now: i64) -> RepoResult<bool> {
    let rows = sqlx::query(
        "UPDATE refunds SET status = 'PAID', paid_at = ?1, updated_at = ?1 WHERE id = ?2 AND status IN ('PENDING', 'INITIATED')",
    )
    .bind(now)
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(rows.rows_affected() == 1)
}

/// Any non-PAID status → `PAID` (administrative override)
pub async fn force_paid(conn: &mut SqliteConnection, id: i64, now: i64) -> RepoResult<bool> {
    let rows = sqlx::query(
        "UPDATE refunds SET status = 'PAID', paid_at = ?1, cancelled_at = NULL, cancellation_reason = NULL, updated_at = ?1 WHERE id = ?2 AND status != 'PAID'",
    )
    .bind(now)
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(rows.rows_affected() == 1)
}

/// `PENDING | INITIATED → FAILED`
pub async fn mark_failed(
    conn: &mut SqliteConnection,
    id: i64,
    reason: &str,
    now: i64,
) -> RepoResult<bool> {
    let rows = sqlx::query(
        "UPDATE refunds SET status = 'FAILED', failure_reason = ?1, updated_at = ?2 WHERE id = ?3 AND status IN ('PENDING', 'INITIATED')",
    )
    .bind(reason)
    .bind(now)
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(rows.rows_affected() == 1)
}

/// Cancel any refund that is not PAID (or already cancelled)
pub async fn cancel_unpaid(
    conn: &mut SqliteConnection,
    voucher_id: i64,
    reason: &str,
    now: i64,
) -> RepoResult<bool> {
    let rows = sqlx::query(
        "UPDATE refunds SET status = 'CANCELLED', cancelled_at = ?1, cancellation_reason = ?2, updated_at = ?1 WHERE voucher_id = ?3 AND status NOT IN ('PAID', 'CANCELLED')",
    )
    .bind(now)
    .bind(reason)
    .bind(voucher_id)
    .execute(&mut *conn)
    .await?;
    Ok(rows.rows_affected() == 1)
}
