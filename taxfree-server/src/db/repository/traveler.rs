//! Traveler Repository
//!
//! Travelers are matched by passport hash only.

use shared::models::Traveler;
use sqlx::SqliteConnection;

use super::{RepoError, RepoResult};

const SELECT: &str = "SELECT id, passport_hash, passport_last4, passport_copy, first_name, last_name, nationality, residence_country, date_of_birth, email, created_at FROM travelers";

pub async fn find_by_id(conn: &mut SqliteConnection, id: i64) -> RepoResult<Option<Traveler>> {
    let traveler = sqlx::query_as::<_, Traveler>(&format!("{SELECT} WHERE id = ?"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(traveler)
}

pub async fn find_by_hash(
    conn: &mut SqliteConnection,
    passport_hash: &str,
) -> RepoResult<Option<Traveler>> {
    let traveler = sqlx::query_as::<_, Traveler>(&format!("{SELECT} WHERE passport_hash = ?"))
        .bind(passport_hash)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(traveler)
}

pub async fn insert(conn: &mut SqliteConnection, t: &Traveler) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO travelers (id, passport_hash, passport_last4, passport_copy, first_name, last_name, nationality, residence_country, date_of_birth, email, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(t.id)
    .bind(&t.passport_hash)
    .bind(&t.passport_last4)
    .bind(&t.passport_copy)
    .bind(&t.first_name)
    .bind(&t.last_name)
    .bind(&t.nationality)
    .bind(&t.residence_country)
    .bind(t.date_of_birth)
    .bind(&t.email)
    .bind(t.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Refresh the mutable contact fields of a returning traveler
pub async fn update_contact(conn: &mut SqliteConnection, t: &Traveler) -> RepoResult<()> {
    let rows = sqlx::query(
        "UPDATE travelers SET first_name = ?, last_name = ?, residence_country = ?, email = COALESCE(?, email), date_of_birth = COALESCE(?, date_of_birth), passport_copy = COALESCE(?, passport_copy) WHERE id = ?",
    )
    .bind(&t.first_name)
    .bind(&t.last_name)
    .bind(&t.residence_country)
    .bind(&t.email)
    .bind(t.date_of_birth)
    .bind(&t.passport_copy)
    .bind(t.id)
    .execute(&mut *conn)
    .await?;
    if rows.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!("Traveler {} not found", t.id)));
    }
    Ok(())
}

/// Vouchers created for a traveler since `since` (ms)
pub async fn count_vouchers_since(
    conn: &mut SqliteConnection,
    traveler_id: i64,
    since: i64,
) -> RepoResult<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM vouchers WHERE traveler_id = ? AND created_at >= ?",
    )
    .bind(traveler_id)
    .bind(since)
    .fetch_one(&mut *conn)
    .await?;
    Ok(count)
}
