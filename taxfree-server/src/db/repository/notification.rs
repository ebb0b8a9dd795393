//! Notification Repository

use shared::models::{Notification, RecipientKind};
use sqlx::SqliteConnection;

use super::{RepoResult, page};

pub async fn insert(conn: &mut SqliteConnection, n: &Notification) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO notifications (id, recipient_kind, recipient_id, title, message, related_entity, related_id, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(n.id)
    .bind(n.recipient_kind)
    .bind(&n.recipient_id)
    .bind(&n.title)
    .bind(&n.message)
    .bind(&n.related_entity)
    .bind(&n.related_id)
    .bind(n.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn list_for_recipient(
    conn: &mut SqliteConnection,
    kind: RecipientKind,
    recipient_id: &str,
    limit: i64,
    offset: i64,
) -> RepoResult<Vec<Notification>> {
    let (limit, offset) = page(limit, offset);
    let rows = sqlx::query_as::<_, Notification>(
        "SELECT id, recipient_kind, recipient_id, title, message, related_entity, related_id, created_at FROM notifications WHERE recipient_kind = ? AND recipient_id = ? ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
    )
    .bind(kind)
    .bind(recipient_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}
