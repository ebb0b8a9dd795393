//! Offline synchronisation models

use serde::{Deserialize, Serialize};

use super::validation::{RefusalReason, ValidationDecision, ValidationSnapshot};

/// A decision taken without connectivity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfflineDecision {
    pub voucher_id: i64,
    pub decision: ValidationDecision,
    pub refusal_reason: Option<RefusalReason>,
    pub refusal_details: Option<String>,
    #[serde(default)]
    pub physical_control_done: bool,
    pub control_notes: Option<String>,
    /// Client clock (ms) when the decision was taken
    pub offline_timestamp: i64,
}

/// Offline batch submitted on reconnection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRequest {
    /// Client-generated
    pub batch_id: String,
    pub validations: Vec<OfflineDecision>,
}

/// Per-item failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncItemError {
    pub voucher_id: i64,
    pub error: String,
    pub is_conflict: bool,
    /// Existing decision, for conflicts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_validation: Option<ValidationSnapshot>,
}

/// Batch outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResponse {
    pub batch_id: String,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub errors: Vec<SyncItemError>,
}

/// Persisted record of one reconciliation pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfflineSyncBatch {
    pub id: i64,
    pub batch_id: String,
    pub agent_id: String,
    pub exit_point_id: String,
    pub submitted_count: i64,
    pub successful_count: i64,
    pub failed_count: i64,
    pub errors: Vec<SyncItemError>,
    pub synced_at: i64,
}
