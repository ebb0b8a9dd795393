//! Customs validation (agent decision) model

use serde::{Deserialize, Serialize};
use std::fmt;

/// Agent decision on a voucher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum ValidationDecision {
    Validated,
    Refused,
    ControlRequired,
}

impl ValidationDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validated => "VALIDATED",
            Self::Refused => "REFUSED",
            Self::ControlRequired => "CONTROL_REQUIRED",
        }
    }
}

impl fmt::Display for ValidationDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a voucher was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum RefusalReason {
    Expired,
    InvalidDocuments,
    GoodsNotPresent,
    GoodsMismatch,
    TravelerMismatch,
    AlreadyValidated,
    SuspectedFraud,
    Other,
}

/// Customs validation record, at most one per voucher
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Validation {
    pub id: i64,
    pub voucher_id: i64,
    pub decision: ValidationDecision,
    /// Present iff `decision == REFUSED`
    pub refusal_reason: Option<RefusalReason>,
    pub refusal_details: Option<String>,
    pub physical_control_done: bool,
    pub control_notes: Option<String>,
    pub agent_id: String,
    pub agent_name: String,
    pub exit_point_id: Option<String>,
    /// Server-side decision time
    pub decided_at: i64,
    pub is_offline: bool,
    pub offline_batch_id: Option<String>,
    /// Client clock at decision time (offline only)
    pub offline_timestamp: Option<i64>,
    pub synced_at: Option<i64>,
}

impl Validation {
    pub fn snapshot(&self) -> ValidationSnapshot {
        ValidationSnapshot {
            decision: self.decision,
            agent_id: self.agent_id.clone(),
            agent_name: self.agent_name.clone(),
            exit_point_id: self.exit_point_id.clone(),
            decided_at: self.decided_at,
        }
    }
}

/// The parts of a validation surfaced to clients in conflicts and kept as
/// override evidence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSnapshot {
    pub decision: ValidationDecision,
    pub agent_id: String,
    pub agent_name: String,
    pub exit_point_id: Option<String>,
    pub decided_at: i64,
}

/// Decision payload (online scan)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionInput {
    pub decision: ValidationDecision,
    pub refusal_reason: Option<RefusalReason>,
    pub refusal_details: Option<String>,
    #[serde(default)]
    pub physical_control_done: bool,
    pub control_notes: Option<String>,
}

impl DecisionInput {
    pub fn validated() -> Self {
        Self {
            decision: ValidationDecision::Validated,
            refusal_reason: None,
            refusal_details: None,
            physical_control_done: false,
            control_notes: None,
        }
    }

    pub fn refused(reason: RefusalReason) -> Self {
        Self {
            decision: ValidationDecision::Refused,
            refusal_reason: Some(reason),
            ..Self::validated()
        }
    }

    pub fn control_required() -> Self {
        Self {
            decision: ValidationDecision::ControlRequired,
            ..Self::validated()
        }
    }
}
