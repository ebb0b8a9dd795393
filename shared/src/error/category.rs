//! Error category classification

use super::codes::ErrorCode;
use serde::{Deserialize, Serialize};

/// Error category classification based on error code ranges
///
/// Categories are determined by the leading digit of the error code:
/// - 0xxx: General errors
/// - 1xxx: Authentication errors
/// - 2xxx: Permission errors
/// - 3xxx: Voucher errors
/// - 4xxx: Customs decision errors
/// - 5xxx: Refund errors
/// - 6xxx: Shift errors
/// - 7xxx: Status override errors
/// - 9xxx: System errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// General errors (0xxx)
    General,
    /// Authentication errors (1xxx)
    Auth,
    /// Permission errors (2xxx)
    Permission,
    /// Voucher errors (3xxx)
    Voucher,
    /// Customs decision errors (4xxx)
    Decision,
    /// Refund errors (5xxx)
    Refund,
    /// Shift errors (6xxx)
    Shift,
    /// Status override errors (7xxx)
    Override,
    /// System errors (9xxx)
    System,
}

impl ErrorCategory {
    /// Determine category from error code value
    pub fn from_code(code: u16) -> Self {
        match code {
            0..1000 => Self::General,
            1000..2000 => Self::Auth,
            2000..3000 => Self::Permission,
            3000..4000 => Self::Voucher,
            4000..5000 => Self::Decision,
            5000..6000 => Self::Refund,
            6000..7000 => Self::Shift,
            7000..8000 => Self::Override,
            _ => Self::System,
        }
    }

    /// Get the string name for this category
    pub fn name(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Auth => "auth",
            Self::Permission => "permission",
            Self::Voucher => "voucher",
            Self::Decision => "decision",
            Self::Refund => "refund",
            Self::Shift => "shift",
            Self::Override => "override",
            Self::System => "system",
        }
    }
}

impl ErrorCode {
    /// Get the category for this error code
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::from_code(self.code())
    }
}
