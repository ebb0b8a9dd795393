//! Rule Set Repository

use shared::models::{RuleParams, RuleSet, RuleSetCreate};
use sqlx::SqliteConnection;

use super::{RepoError, RepoResult, parse_json, to_json};

#[derive(sqlx::FromRow)]
struct RuleSetRow {
    id: i64,
    version: String,
    name: String,
    is_active: bool,
    params: String,
    created_at: i64,
}

impl TryFrom<RuleSetRow> for RuleSet {
    type Error = RepoError;

    fn try_from(r: RuleSetRow) -> RepoResult<Self> {
        Ok(RuleSet {
            id: r.id,
            version: r.version,
            name: r.name,
            is_active: r.is_active,
            params: parse_json::<RuleParams>(&r.params, "rule_sets.params")?,
            created_at: r.created_at,
        })
    }
}

const SELECT: &str = "SELECT id, version, name, is_active, params, created_at FROM rule_sets";

pub async fn find_by_id(conn: &mut SqliteConnection, id: i64) -> RepoResult<Option<RuleSet>> {
    sqlx::query_as::<_, RuleSetRow>(&format!("{SELECT} WHERE id = ?"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .map(RuleSet::try_from)
        .transpose()
}

/// The rule set in force, if any
pub async fn find_active(conn: &mut SqliteConnection) -> RepoResult<Option<RuleSet>> {
    sqlx::query_as::<_, RuleSetRow>(&format!("{SELECT} WHERE is_active = 1"))
        .fetch_optional(&mut *conn)
        .await?
        .map(RuleSet::try_from)
        .transpose()
}

pub async fn create(conn: &mut SqliteConnection, data: RuleSetCreate) -> RepoResult<RuleSet> {
    if data.version.trim().is_empty() {
        return Err(RepoError::Validation("Rule set version must not be empty".into()));
    }
    let p = &data.params;
    if p.operator_fee_percentage.is_sign_negative()
        || p.default_vat_rate.is_sign_negative()
        || p.min_operator_fee.is_sign_negative()
        || p.operator_fee_fixed.is_sign_negative()
    {
        return Err(RepoError::Validation("Rates and fees cannot be negative".into()));
    }
    if p.medium_risk_threshold > p.risk_score_threshold {
        return Err(RepoError::Validation(
            "medium_risk_threshold cannot exceed risk_score_threshold".into(),
        ));
    }

    let id = shared::util::snowflake_id();
    let now = shared::util::now_millis();
    sqlx::query(
        "INSERT INTO rule_sets (id, version, name, is_active, params, created_at) VALUES (?, ?, ?, 0, ?, ?)",
    )
    .bind(id)
    .bind(data.version.trim())
    .bind(&data.name)
    .bind(to_json(&data.params)?)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    if data.activate {
        activate(conn, id).await?;
    }

    find_by_id(conn, id)
        .await?
        .ok_or_else(|| RepoError::Database("Failed to create rule set".into()))
}

/// Make `id` the only active rule set
pub async fn activate(conn: &mut SqliteConnection, id: i64) -> RepoResult<()> {
    sqlx::query("UPDATE rule_sets SET is_active = 0 WHERE is_active = 1 AND id != ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    let rows = sqlx::query("UPDATE rule_sets SET is_active = 1 WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    if rows.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!("Rule set {id} not found")));
    }
    Ok(())
}
