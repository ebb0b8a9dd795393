//! Administrative status override models

use serde::{Deserialize, Serialize};

use super::notification::NotificationTarget;
use super::validation::ValidationSnapshot;
use super::voucher::VoucherStatus;

/// Minimum length of the trimmed override reason
pub const MIN_OVERRIDE_REASON_LEN: usize = 10;

/// Kind of correction, derived from the transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum OverrideType {
    ValidationReversal,
    ReopenForm,
    StatusCorrection,
}

impl OverrideType {
    /// Classify a `previous → new` transition
    pub fn classify(previous: VoucherStatus, new: VoucherStatus) -> Self {
        match (previous, new) {
            (VoucherStatus::Refused, VoucherStatus::Validated) => Self::ValidationReversal,
            (_, VoucherStatus::Issued | VoucherStatus::ValidationPending) => Self::ReopenForm,
            _ => Self::StatusCorrection,
        }
    }
}

/// Write-once override record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusOverride {
    pub id: i64,
    pub voucher_id: i64,
    pub previous_status: VoucherStatus,
    pub new_status: VoucherStatus,
    pub override_type: OverrideType,
    /// Validation as it was before the override touched anything
    pub original_validation: Option<ValidationSnapshot>,
    pub reason: String,
    pub reference_document: Option<String>,
    pub requesting_agent_id: Option<String>,
    pub performed_by_id: String,
    pub performed_by_name: String,
    /// Planned notification targets
    pub notifications: Vec<NotificationTarget>,
    pub created_at: i64,
}

/// Status-correction request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusCorrection {
    pub voucher_id: i64,
    pub new_status: VoucherStatus,
    pub reason: String,
    pub reference_document: Option<String>,
    pub requesting_agent_id: Option<String>,
    #[serde(default = "default_notify")]
    pub notify_parties: bool,
}

fn default_notify() -> bool {
    true
}

/// Status-correction response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverrideOutcome {
    pub success: bool,
    pub override_id: i64,
    pub previous_status: VoucherStatus,
    pub new_status: VoucherStatus,
    /// Targets that were actually notified
    pub notifications_sent: Vec<NotificationTarget>,
}

/// Candidate override target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableStatus {
    pub status: VoucherStatus,
    pub label: String,
    pub recommended: bool,
    pub warning: Option<String>,
}

impl AvailableStatus {
    /// Every status except `current`, annotated
    pub fn for_current(current: VoucherStatus) -> Vec<Self> {
        VoucherStatus::ALL
            .into_iter()
            .filter(|s| *s != current)
            .map(|status| {
                use VoucherStatus::*;
                let recommended = matches!(
                    (current, status),
                    (Refused, Validated)
                        | (Refused, ValidationPending)
                        | (Validated, ValidationPending)
                );
                let warning = match (current, status) {
                    (Validated, Refused) => Some("This will cancel the validation".to_string()),
                    (from, Refunded) if from != Validated => {
                        Some("The voucher has not been validated".to_string())
                    }
                    _ => None,
                };
                Self {
                    status,
                    label: status.label().to_string(),
                    recommended,
                    warning,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        use VoucherStatus::*;
        assert_eq!(
            OverrideType::classify(Refused, Validated),
            OverrideType::ValidationReversal
        );
        assert_eq!(
            OverrideType::classify(Validated, ValidationPending),
            OverrideType::ReopenForm
        );
        assert_eq!(OverrideType::classify(Expired, Issued), OverrideType::ReopenForm);
        assert_eq!(
            OverrideType::classify(Validated, Refused),
            OverrideType::StatusCorrection
        );
        assert_eq!(
            OverrideType::classify(Issued, Validated),
            OverrideType::StatusCorrection
        );
    }

    #[test]
    fn test_available_statuses_excludes_current() {
        let list = AvailableStatus::for_current(VoucherStatus::Refused);
        assert_eq!(list.len(), 7);
        assert!(list.iter().all(|s| s.status != VoucherStatus::Refused));
        let validated = list
            .iter()
            .find(|s| s.status == VoucherStatus::Validated)
            .unwrap();
        assert!(validated.recommended);
    }

    #[test]
    fn test_available_statuses_warnings() {
        let from_validated = AvailableStatus::for_current(VoucherStatus::Validated);
        let refused = from_validated
            .iter()
            .find(|s| s.status == VoucherStatus::Refused)
            .unwrap();
        assert!(refused.warning.is_some());
        let refunded = from_validated
            .iter()
            .find(|s| s.status == VoucherStatus::Refunded)
            .unwrap();
        assert!(refunded.warning.is_none());

        let from_issued = AvailableStatus::for_current(VoucherStatus::Issued);
        let refunded = from_issued
            .iter()
            .find(|s| s.status == VoucherStatus::Refunded)
            .unwrap();
        assert!(refunded.warning.is_some());
    }

    #[test]
    fn test_correction_notify_defaults_true() {
        let req: StatusCorrection = serde_json::from_str(
            r#"{"voucher_id":1,"new_status":"VALIDATED","reason":"agent scanned wrong voucher"}"#,
        )
        .unwrap();
        assert!(req.notify_parties);
    }
}
