//! Repository Module
//!
//! Free functions over a `SqliteConnection`, so the same call works on a
//! pooled connection or inside a [`WriteTx`](crate::db::WriteTx).

pub mod invoice;
pub mod merchant;
pub mod notification;
pub mod refund;
pub mod rule_set;
pub mod shift;
pub mod status_override;
pub mod sync_batch;
pub mod traveler;
pub mod validation;
pub mod voucher;

use rust_decimal::Decimal;
use shared::{AppError, ErrorCode};
use std::str::FromStr;
use thiserror::Error;

/// Repository error types
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => RepoError::NotFound(err.to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepoError::Duplicate(db.message().to_string())
            }
            _ => RepoError::Database(err.to_string()),
        }
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound(msg) => AppError::with_message(ErrorCode::NotFound, msg),
            RepoError::Duplicate(msg) => AppError::with_message(ErrorCode::AlreadyExists, msg),
            RepoError::Validation(msg) => AppError::validation(msg),
            RepoError::Database(msg) => AppError::database(msg),
        }
    }
}

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepoError>;

/// Parse a decimal TEXT column
pub(crate) fn parse_decimal(value: &str, column: &str) -> RepoResult<Decimal> {
    Decimal::from_str(value)
        .map_err(|e| RepoError::Database(format!("Corrupt decimal in {column}: {e}")))
}

/// Parse a JSON TEXT column
pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(value: &str, column: &str) -> RepoResult<T> {
    serde_json::from_str(value)
        .map_err(|e| RepoError::Database(format!("Corrupt JSON in {column}: {e}")))
}

pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> RepoResult<String> {
    serde_json::to_string(value)
        .map_err(|e| RepoError::Database(format!("Failed to serialize: {e}")))
}

/// Clamp list paging: non-positive limits fall back to 50, capped at 500
pub(crate) fn page(limit: i64, offset: i64) -> (i64, i64) {
    let limit = if limit <= 0 { 50 } else { limit.min(500) };
    (limit, offset.max(0))
}
