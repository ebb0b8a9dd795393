//! Scan-time eligibility report

use serde::{Deserialize, Serialize};

use super::voucher::Voucher;

/// Outcome of a single check, ordered by precedence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckStatus {
    Ok,
    Warning,
    ControlRequired,
    Blocked,
}

/// Identifies which check produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckCode {
    AlreadyProcessed,
    NotProcessed,
    Cancelled,
    InvalidStatus,
    ValidStatus,
    Expired,
    ExpiringSoon,
    ValidDate,
    PurchaseTooOld,
    PurchaseDateOk,
    VatInconsistent,
    AmountsOk,
    HighRisk,
    MediumRisk,
    LowRisk,
    ControlRequired,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityCheck {
    pub code: CheckCode,
    pub status: CheckStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Ordered checks plus the aggregate verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityReport {
    pub checks: Vec<EligibilityCheck>,
    pub overall: CheckStatus,
    pub can_validate: bool,
    pub blocking_count: usize,
    pub warning_count: usize,
    pub ok_count: usize,
    pub message: String,
}

/// Response of a scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub voucher: Voucher,
    pub report: EligibilityReport,
    pub can_validate: bool,
}

/// Scan request: a token or a voucher number
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanRequest {
    pub token: Option<String>,
    pub voucher_number: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_precedence_order() {
        assert!(CheckStatus::Blocked > CheckStatus::ControlRequired);
        assert!(CheckStatus::ControlRequired > CheckStatus::Warning);
        assert!(CheckStatus::Warning > CheckStatus::Ok);
    }

    #[test]
    fn test_code_serde_format() {
        let json = serde_json::to_string(&CheckCode::PurchaseTooOld).unwrap();
        assert_eq!(json, "\"PURCHASE_TOO_OLD\"");
    }
}
