//! Merchant Repository

use super::{RepoError, RepoResult};
use shared::models::{Merchant, MerchantCreate};
use sqlx::SqliteConnection;

pub async fn find_by_id(conn: &mut SqliteConnection, id: i64) -> RepoResult<Option<Merchant>> {
    let merchant = sqlx::query_as::<_, Merchant>(
        "SELECT id, name, status, created_at FROM merchants WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(merchant)
}

pub async fn create(conn: &mut SqliteConnection, data: MerchantCreate) -> RepoResult<Merchant> {
    if data.name.trim().is_empty() {
        return Err(RepoError::Validation("Merchant name must not be empty".into()));
    }
    let id = shared::util::snowflake_id();
    let now = shared::util::now_millis();
    sqlx::query("INSERT INTO merchants (id, name, status, created_at) VALUES (?, ?, ?, ?)")
        .bind(id)
        .bind(data.name.trim())
        .bind(data.status)
        .bind(now)
        .execute(&mut *conn)
        .await?;

    find_by_id(conn, id)
        .await?
        .ok_or_else(|| RepoError::Database("Failed to create merchant".into()))
}
