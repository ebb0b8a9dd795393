//! 通知发送
//!
//! Best-effort：发送失败只记录日志，从不回滚业务事务。

use std::sync::Arc;

use async_trait::async_trait;
use shared::models::{Notification, NotificationTarget};
use shared::util::{now_millis, snowflake_id};
use thiserror::Error;

use crate::db::DbService;
use crate::db::repository::{RepoError, notification};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notification storage failed: {0}")]
    Storage(#[from] RepoError),

    #[error("Notification channel unavailable: {0}")]
    Unavailable(String),
}

/// Message to one recipient
#[derive(Debug, Clone)]
pub struct OutgoingNotification {
    pub target: NotificationTarget,
    pub title: String,
    pub message: String,
    pub related_entity: &'static str,
    pub related_id: String,
}

#[async_trait]
pub trait NotificationSink: Send + Sync + std::fmt::Debug {
    async fn send(&self, notification: &OutgoingNotification) -> Result<(), NotifyError>;
}

pub type SharedNotificationSink = Arc<dyn NotificationSink>;

/// Default sink: rows in the `notifications` table
#[derive(Clone, Debug)]
pub struct DbNotifier {
    db: DbService,
}

impl DbNotifier {
    pub fn new(db: DbService) -> Self {
        Self { db }
    }
}

#[async_trait]
impl NotificationSink for DbNotifier {
    async fn send(&self, n: &OutgoingNotification) -> Result<(), NotifyError> {
        let row = Notification {
            id: snowflake_id(),
            recipient_kind: n.target.kind,
            recipient_id: n.target.recipient_id.clone(),
            title: n.title.clone(),
            message: n.message.clone(),
            related_entity: n.related_entity.to_string(),
            related_id: n.related_id.clone(),
            created_at: now_millis(),
        };
        let mut tx = self.db.begin_write().await?;
        notification::insert(&mut tx, &row).await?;
        tx.commit().await?;
        Ok(())
    }
}

/// Send each notification, returning the targets that were reached
pub async fn dispatch_all(
    sink: &dyn NotificationSink,
    outgoing: &[OutgoingNotification],
) -> Vec<NotificationTarget> {
    let mut sent = Vec::with_capacity(outgoing.len());
    for n in outgoing {
        match sink.send(n).await {
            Ok(()) => sent.push(n.target.clone()),
            Err(e) => {
                tracing::warn!(
                    recipient = %n.target.recipient_id,
                    kind = ?n.target.kind,
                    error = %e,
                    "Notification dispatch failed"
                );
            }
        }
    }
    sent
}
