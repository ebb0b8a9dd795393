//! Status Override Repository
//!
//! Write-once: only `insert` and reads. The table rejects UPDATE and DELETE
//! through triggers.

use shared::models::{
    NotificationTarget, OverrideType, StatusOverride, ValidationSnapshot, VoucherStatus,
};
use sqlx::SqliteConnection;

use super::{RepoError, RepoResult, parse_json, to_json};

#[derive(sqlx::FromRow)]
struct OverrideRow {
    id: i64,
    voucher_id: i64,
    previous_status: VoucherStatus,
    new_status: VoucherStatus,
    override_type: OverrideType,
    original_validation: Option<String>,
    reason: String,
    reference_document: Option<String>,
    requesting_agent_id: Option<String>,
    performed_by_id: String,
    performed_by_name: String,
    notifications: String,
    created_at: i64,
}

impl TryFrom<OverrideRow> for StatusOverride {
    type Error = RepoError;

    fn try_from(r: OverrideRow) -> RepoResult<Self> {
        let original_validation = r
            .original_validation
            .as_deref()
            .map(|s| parse_json::<ValidationSnapshot>(s, "status_overrides.original_validation"))
            .transpose()?;
        Ok(StatusOverride {
            id: r.id,
            voucher_id: r.voucher_id,
            previous_status: r.previous_status,
            new_status: r.new_status,
            override_type: r.override_type,
            original_validation,
            reason: r.reason,
            reference_document: r.reference_document,
            requesting_agent_id: r.requesting_agent_id,
            performed_by_id: r.performed_by_id,
            performed_by_name: r.performed_by_name,
            notifications: parse_json::<Vec<NotificationTarget>>(
                &r.notifications,
                "status_overrides.notifications",
            )?,
            created_at: r.created_at,
        })
    }
}

pub async fn insert(conn: &mut SqliteConnection, o: &StatusOverride) -> RepoResult<()> {
    let original = o.original_validation.as_ref().map(to_json).transpose()?;
    sqlx::query(
        "INSERT INTO status_overrides (id, voucher_id, previous_status, new_status, override_type, original_validation, reason, reference_document, requesting_agent_id, performed_by_id, performed_by_name, notifications, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(o.id)
    .bind(o.voucher_id)
    .bind(o.previous_status)
    .bind(o.new_status)
    .bind(o.override_type)
    .bind(original)
    .bind(&o.reason)
    .bind(&o.reference_document)
    .bind(&o.requesting_agent_id)
    .bind(&o.performed_by_id)
    .bind(&o.performed_by_name)
    .bind(to_json(&o.notifications)?)
    .bind(o.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Override history of a voucher, newest first
pub async fn list_by_voucher(
    conn: &mut SqliteConnection,
    voucher_id: i64,
) -> RepoResult<Vec<StatusOverride>> {
    sqlx::query_as::<_, OverrideRow>(
        "SELECT id, voucher_id, previous_status, new_status, override_type, original_validation, reason, reference_document, requesting_agent_id, performed_by_id, performed_by_name, notifications, created_at FROM status_overrides WHERE voucher_id = ? ORDER BY created_at DESC, id DESC",
    )
    .bind(voucher_id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(StatusOverride::try_from)
    .collect()
}
