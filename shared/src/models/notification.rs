//! Outgoing notifications

use serde::{Deserialize, Serialize};

/// Who a notification is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum RecipientKind {
    Agent,
    Merchant,
}

/// Planned recipient of a notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationTarget {
    pub kind: RecipientKind,
    /// Agent id or merchant id
    pub recipient_id: String,
}

impl NotificationTarget {
    pub fn agent(agent_id: impl Into<String>) -> Self {
        Self {
            kind: RecipientKind::Agent,
            recipient_id: agent_id.into(),
        }
    }

    pub fn merchant(merchant_id: i64) -> Self {
        Self {
            kind: RecipientKind::Merchant,
            recipient_id: merchant_id.to_string(),
        }
    }
}

/// Delivered notification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Notification {
    pub id: i64,
    pub recipient_kind: RecipientKind,
    pub recipient_id: String,
    pub title: String,
    pub message: String,
    /// e.g. `voucher`
    pub related_entity: String,
    pub related_id: String,
    pub created_at: i64,
}
