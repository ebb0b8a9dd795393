//! Voucher Repository
//!
//! Status transitions are conditional updates (`WHERE status IN (...)`), the
//! caller learns from the returned flag whether it won.

use shared::models::{RuleSnapshot, Voucher, VoucherQuery, VoucherStatus};
use sqlx::SqliteConnection;

use super::{RepoError, RepoResult, page, parse_decimal, parse_json, to_json};

#[derive(sqlx::FromRow)]
struct VoucherRow {
    id: i64,
    voucher_number: String,
    invoice_id: i64,
    traveler_id: i64,
    merchant_id: i64,
    created_by: String,
    currency: String,
    eligible_amount: String,
    vat_amount: String,
    operator_fee: String,
    refund_amount: String,
    status: VoucherStatus,
    issued_at: Option<i64>,
    expires_at: i64,
    validated_at: Option<i64>,
    cancelled_at: Option<i64>,
    cancelled_by: Option<String>,
    cancellation_reason: Option<String>,
    risk_score: i32,
    risk_flags: String,
    requires_control: bool,
    token_payload: Option<String>,
    token_signature: Option<String>,
    rule_snapshot: String,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<VoucherRow> for Voucher {
    type Error = RepoError;

    fn try_from(r: VoucherRow) -> RepoResult<Self> {
        Ok(Voucher {
            id: r.id,
            voucher_number: r.voucher_number,
            invoice_id: r.invoice_id,
            traveler_id: r.traveler_id,
            merchant_id: r.merchant_id,
            created_by: r.created_by,
            currency: r.currency,
            eligible_amount: parse_decimal(&r.eligible_amount, "vouchers.eligible_amount")?,
            vat_amount: parse_decimal(&r.vat_amount, "vouchers.vat_amount")?,
            operator_fee: parse_decimal(&r.operator_fee, "vouchers.operator_fee")?,
            refund_amount: parse_decimal(&r.refund_amount, "vouchers.refund_amount")?,
            status: r.status,
            issued_at: r.issued_at,
            expires_at: r.expires_at,
            validated_at: r.validated_at,
            cancelled_at: r.cancelled_at,
            cancelled_by: r.cancelled_by,
            cancellation_reason: r.cancellation_reason,
            risk_score: r.risk_score,
            risk_flags: parse_json(&r.risk_flags, "vouchers.risk_flags")?,
            requires_control: r.requires_control,
            token_payload: r.token_payload,
            token_signature: r.token_signature,
            rule_snapshot: parse_json::<RuleSnapshot>(&r.rule_snapshot, "vouchers.rule_snapshot")?,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

const SELECT: &str = "SELECT id, voucher_number, invoice_id, traveler_id, merchant_id, created_by, currency, eligible_amount, vat_amount, operator_fee, refund_amount, status, issued_at, expires_at, validated_at, cancelled_at, cancelled_by, cancellation_reason, risk_score, risk_flags, requires_control, token_payload, token_signature, rule_snapshot, created_at, updated_at FROM vouchers";

const EXPIRABLE: &str = "('CREATED', 'ISSUED', 'VALIDATION_PENDING')";

pub async fn find_by_id(conn: &mut SqliteConnection, id: i64) -> RepoResult<Option<Voucher>> {
    sqlx::query_as::<_, VoucherRow>(&format!("{SELECT} WHERE id = ?"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .map(Voucher::try_from)
        .transpose()
}

pub async fn find_by_number(
    conn: &mut SqliteConnection,
    voucher_number: &str,
) -> RepoResult<Option<Voucher>> {
    sqlx::query_as::<_, VoucherRow>(&format!("{SELECT} WHERE voucher_number = ?"))
        .bind(voucher_number)
        .fetch_optional(&mut *conn)
        .await?
        .map(Voucher::try_from)
        .transpose()
}

pub async fn find_by_invoice(
    conn: &mut SqliteConnection,
    invoice_id: i64,
) -> RepoResult<Option<Voucher>> {
    sqlx::query_as::<_, VoucherRow>(&format!("{SELECT} WHERE invoice_id = ?"))
        .bind(invoice_id)
        .fetch_optional(&mut *conn)
        .await?
        .map(Voucher::try_from)
        .transpose()
}

pub async fn list(conn: &mut SqliteConnection, q: &VoucherQuery) -> RepoResult<Vec<Voucher>> {
    let (limit, offset) = page(q.limit, q.offset);
    sqlx::query_as::<_, VoucherRow>(&format!(
        "{SELECT} WHERE (?1 IS NULL OR status = ?1) AND (?2 IS NULL OR merchant_id = ?2) ORDER BY created_at DESC, id DESC LIMIT ?3 OFFSET ?4"
    ))
    .bind(q.status)
    .bind(q.merchant_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(Voucher::try_from)
    .collect()
}

/// Insert a new voucher
///
/// A clash on `voucher_number` or `invoice_id` surfaces as
/// [`RepoError::Duplicate`].
pub async fn insert(conn: &mut SqliteConnection, v: &Voucher) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO vouchers (id, voucher_number, invoice_id, traveler_id, merchant_id, created_by, currency, eligible_amount, vat_amount, operator_fee, refund_amount, status, issued_at, expires_at, validated_at, cancelled_at, cancelled_by, cancellation_reason, risk_score, risk_flags, requires_control, token_payload, token_signature, rule_snapshot, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(v.id)
    .bind(&v.voucher_number)
    .bind(v.invoice_id)
    .bind(v.traveler_id)
    .bind(v.merchant_id)
    .bind(&v.created_by)
    .bind(&v.currency)
    .bind(v.eligible_amount.to_string())
    .bind(v.vat_amount.to_string())
    .bind(v.operator_fee.to_string())
    .bind(v.refund_amount.to_string())
    .bind(v.status)
    .bind(v.issued_at)
    .bind(v.expires_at)
    .bind(v.validated_at)
    .bind(v.cancelled_at)
    .bind(&v.cancelled_by)
    .bind(&v.cancellation_reason)
    .bind(v.risk_score)
    .bind(to_json(&v.risk_flags)?)
    .bind(v.requires_control)
    .bind(&v.token_payload)
    .bind(&v.token_signature)
    .bind(to_json(&v.rule_snapshot)?)
    .bind(v.created_at)
    .bind(v.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// `CREATED → ISSUED` with the signed token
pub async fn mark_issued(
    conn: &mut SqliteConnection,
    id: i64,
    issued_at: i64,
    token_payload: &str,
    token_signature: &str,
) -> RepoResult<bool> {
    let rows = sqlx::query(
        "UPDATE vouchers SET status = 'ISSUED', issued_at = ?1, token_payload = ?2, token_signature = ?3, updated_at = ?1 WHERE id = ?4 AND status = 'CREATED'",
    )
    .bind(issued_at)
    .bind(token_payload)
    .bind(token_signature)
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(rows.rows_affected() == 1)
}

/// Apply an agent decision to a scannable voucher
pub async fn apply_decision(
    conn: &mut SqliteConnection,
    id: i64,
    status: VoucherStatus,
    validated_at: Option<i64>,
    now: i64,
) -> RepoResult<bool> {
    let rows = sqlx::query(
        "UPDATE vouchers SET status = ?1, validated_at = COALESCE(?2, validated_at), updated_at = ?3 WHERE id = ?4 AND status IN ('ISSUED', 'VALIDATION_PENDING') AND expires_at > ?3",
    )
    .bind(status)
    .bind(validated_at)
    .bind(now)
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(rows.rows_affected() == 1)
}

pub async fn cancel(
    conn: &mut SqliteConnection,
    id: i64,
    cancelled_by: &str,
    reason: &str,
    now: i64,
) -> RepoResult<bool> {
    let rows = sqlx::query(
        "UPDATE vouchers SET status = 'CANCELLED', cancelled_at = ?1, cancelled_by = ?2, cancellation_reason = ?3, updated_at = ?1 WHERE id = ?4 AND status IN ('CREATED', 'ISSUED')",
    )
    .bind(now)
    .bind(cancelled_by)
    .bind(reason)
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(rows.rows_affected() == 1)
}

/// `VALIDATED → REFUNDED` once the refund is paid
pub async fn mark_refunded(conn: &mut SqliteConnection, id: i64, now: i64) -> RepoResult<bool> {
    let rows = sqlx::query(
        "UPDATE vouchers SET status = 'REFUNDED', updated_at = ? WHERE id = ? AND status = 'VALIDATED'",
    )
    .bind(now)
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(rows.rows_affected() == 1)
}

/// Ids of vouchers past expiry in an expirable status
pub async fn find_expirable_ids(conn: &mut SqliteConnection, now: i64) -> RepoResult<Vec<i64>> {
    let ids = sqlx::query_scalar::<_, i64>(&format!(
        "SELECT id FROM vouchers WHERE status IN {EXPIRABLE} AND expires_at < ? ORDER BY expires_at"
    ))
    .bind(now)
    .fetch_all(&mut *conn)
    .await?;
    Ok(ids)
}

/// Expire one voucher if it still matches the sweep predicate
pub async fn expire(conn: &mut SqliteConnection, id: i64, now: i64) -> RepoResult<bool> {
    let rows = sqlx::query(&format!(
        "UPDATE vouchers SET status = 'EXPIRED', updated_at = ?1 WHERE id = ?2 AND status IN {EXPIRABLE} AND expires_at < ?1"
    ))
    .bind(now)
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(rows.rows_affected() == 1)
}

/// Overwrite the lifecycle fields (administrative override)
///
/// Guarded on the status the caller read, so a concurrent transition makes
/// this a no-op.
pub async fn overwrite_state(
    conn: &mut SqliteConnection,
    v: &Voucher,
    expected: VoucherStatus,
    now: i64,
) -> RepoResult<bool> {
    let rows = sqlx::query(
        "UPDATE vouchers SET status = ?1, validated_at = ?2, cancelled_at = ?3, cancelled_by = ?4, cancellation_reason = ?5, issued_at = ?6, token_payload = ?7, token_signature = ?8, updated_at = ?9 WHERE id = ?10 AND status = ?11",
    )
    .bind(v.status)
    .bind(v.validated_at)
    .bind(v.cancelled_at)
    .bind(&v.cancelled_by)
    .bind(&v.cancellation_reason)
    .bind(v.issued_at)
    .bind(&v.token_payload)
    .bind(&v.token_signature)
    .bind(now)
    .bind(v.id)
    .bind(expected)
    .execute(&mut *conn)
    .await?;
    Ok(rows.rows_affected() == 1)
}
