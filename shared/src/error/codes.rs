//! Unified error codes for the tax-free platform
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Permission errors
//! - 3xxx: Voucher errors
//! - 4xxx: Customs decision errors
//! - 5xxx: Refund errors
//! - 6xxx: Shift errors
//! - 7xxx: Status override errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values so clients can branch
/// on them without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,

    // ==================== 1xxx: Auth ====================
    /// User is not authenticated
    NotAuthenticated = 1001,
    /// Token has expired
    TokenExpired = 1003,
    /// Token is invalid
    TokenInvalid = 1004,

    // ==================== 2xxx: Permission ====================
    /// Permission denied
    PermissionDenied = 2001,
    /// Specific role required
    RoleRequired = 2002,
    /// Admin role required
    AdminRequired = 2003,
    /// Actor has no assigned exit point
    ExitPointRequired = 2004,

    // ==================== 3xxx: Voucher ====================
    /// Voucher not found
    VoucherNotFound = 3001,
    /// Invoice already has a voucher
    VoucherAlreadyExists = 3002,
    /// Voucher is not in a status that allows the operation
    VoucherInvalidStatus = 3003,
    /// Voucher has expired
    VoucherExpired = 3004,
    /// Purchase does not satisfy the eligibility rules
    VoucherNotEligible = 3005,
    /// Invoice not found
    InvoiceNotFound = 3006,
    /// Invoice is cancelled
    InvoiceCancelled = 3007,
    /// No active rule set configured
    NoActiveRuleSet = 3008,
    /// Merchant not found
    MerchantNotFound = 3009,
    /// Scan token failed verification
    ScanTokenInvalid = 3010,

    // ==================== 4xxx: Customs decision ====================
    /// A validation already exists for the voucher
    AlreadyValidated = 4001,
    /// Refusal reason required for a refusal
    RefusalReasonRequired = 4002,
    /// Refusal reason given for a non-refusal decision
    RefusalReasonNotAllowed = 4003,
    /// Offline batch exceeds the configured size
    SyncBatchTooLarge = 4004,
    /// Offline batch contains no items
    SyncBatchEmpty = 4005,

    // ==================== 5xxx: Refund ====================
    /// Refund not found
    RefundNotFound = 5001,
    /// Refund already paid
    RefundAlreadyPaid = 5002,
    /// Refund is not in a status that allows the operation
    RefundInvalidStatus = 5003,
    /// Voucher already has a refund
    RefundAlreadyExists = 5004,

    // ==================== 6xxx: Shift ====================
    /// Shift not found
    ShiftNotFound = 6001,
    /// Agent already has an open shift
    ShiftAlreadyOpen = 6002,
    /// Shift is not in a status that allows the operation
    ShiftInvalidStatus = 6003,

    // ==================== 7xxx: Status override ====================
    /// Voucher is already in the requested status
    OverrideSameStatus = 7001,
    /// Voucher refund is paid and cannot be reopened
    OverrideRefundPaid = 7002,
    /// Override reason is too short
    OverrideReasonTooShort = 7003,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Configuration error
    ConfigError = 9003,
}

impl ErrorCode {
    /// Get the numeric code
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Get the default message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            Self::Success => "Operation completed successfully",
            Self::ValidationFailed => "Validation failed",
            Self::NotFound => "Resource not found",
            Self::AlreadyExists => "Resource already exists",

            // Auth
            Self::NotAuthenticated => "Authentication required",
            Self::TokenExpired => "Token has expired",
            Self::TokenInvalid => "Invalid token",

            // Permission
            Self::PermissionDenied => "Permission denied",
            Self::RoleRequired => "Specific role required",
            Self::AdminRequired => "Admin role required",
            Self::ExitPointRequired => "No exit point assigned to this account",

            // Voucher
            Self::VoucherNotFound => "Voucher not found",
            Self::VoucherAlreadyExists => "A voucher already exists for this invoice",
            Self::VoucherInvalidStatus => "Voucher status does not allow this operation",
            Self::VoucherExpired => "Voucher has expired",
            Self::VoucherNotEligible => "Purchase is not eligible for a tax-free refund",
            Self::InvoiceNotFound => "Invoice not found",
            Self::InvoiceCancelled => "Invoice is cancelled",
            Self::NoActiveRuleSet => "No active rule set",
            Self::MerchantNotFound => "Merchant not found",
            Self::ScanTokenInvalid => "Scan token is invalid",

            // Customs decision
            Self::AlreadyValidated => "Voucher has already been processed",
            Self::RefusalReasonRequired => "A refusal reason is required",
            Self::RefusalReasonNotAllowed => "A refusal reason is only allowed for refusals",
            Self::SyncBatchTooLarge => "Offline batch is too large",
            Self::SyncBatchEmpty => "Offline batch is empty",

            // Refund
            Self::RefundNotFound => "Refund not found",
            Self::RefundAlreadyPaid => "Refund has already been paid",
            Self::RefundInvalidStatus => "Refund status does not allow this operation",
            Self::RefundAlreadyExists => "A refund already exists for this voucher",

            // Shift
            Self::ShiftNotFound => "Shift not found",
            Self::ShiftAlreadyOpen => "An open shift already exists",
            Self::ShiftInvalidStatus => "Shift status does not allow this operation",

            // Override
            Self::OverrideSameStatus => "Voucher is already in the requested status",
            Self::OverrideRefundPaid => "Refund already paid; the voucher cannot be overridden",
            Self::OverrideReasonTooShort => "Override reason must be at least 10 characters",

            // System
            Self::InternalError => "Internal server error",
            Self::DatabaseError => "Database error",
            Self::ConfigError => "Configuration error",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code as u16
    }
}

/// Error returned when converting an unknown u16 into [`ErrorCode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(Self::Success),
            2 => Ok(Self::ValidationFailed),
            3 => Ok(Self::NotFound),
            4 => Ok(Self::AlreadyExists),

            // Auth
            1001 => Ok(Self::NotAuthenticated),
            1003 => Ok(Self::TokenExpired),
            1004 => Ok(Self::TokenInvalid),

            // Permission
            2001 => Ok(Self::PermissionDenied),
            2002 => Ok(Self::RoleRequired),
            2003 => Ok(Self::AdminRequired),
            2004 => Ok(Self::ExitPointRequired),

            // Voucher
            3001 => Ok(Self::VoucherNotFound),
            3002 => Ok(Self::VoucherAlreadyExists),
            3003 => Ok(Self::VoucherInvalidStatus),
            3004 => Ok(Self::VoucherExpired),
            3005 => Ok(Self::VoucherNotEligible),
            3006 => Ok(Self::InvoiceNotFound),
            3007 => Ok(Self::InvoiceCancelled),
            3008 => Ok(Self::NoActiveRuleSet),
            3009 => Ok(Self::MerchantNotFound),
            3010 => Ok(Self::ScanTokenInvalid),

            // Customs decision
            4001 => Ok(Self::AlreadyValidated),
            4002 => Ok(Self::RefusalReasonRequired),
            4003 => Ok(Self::RefusalReasonNotAllowed),
            4004 => Ok(Self::SyncBatchTooLarge),
            4005 => Ok(Self::SyncBatchEmpty),

            // Refund
            5001 => Ok(Self::RefundNotFound),
            5002 => Ok(Self::RefundAlreadyPaid),
            5003 => Ok(Self::RefundInvalidStatus),
            5004 => Ok(Self::RefundAlreadyExists),

            // Shift
            6001 => Ok(Self::ShiftNotFound),
            6002 => Ok(Self::ShiftAlreadyOpen),
            6003 => Ok(Self::ShiftInvalidStatus),

            // Override
            7001 => Ok(Self::OverrideSameStatus),
            7002 => Ok(Self::OverrideRefundPaid),
            7003 => Ok(Self::OverrideReasonTooShort),

            // System
            9001 => Ok(Self::InternalError),
            9002 => Ok(Self::DatabaseError),
            9003 => Ok(Self::ConfigError),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_values() {
        assert_eq!(ErrorCode::Success.code(), 0);
        assert_eq!(ErrorCode::NotFound.code(), 3);
        assert_eq!(ErrorCode::VoucherNotFound.code(), 3001);
        assert_eq!(ErrorCode::AlreadyValidated.code(), 4001);
        assert_eq!(ErrorCode::RefundAlreadyPaid.code(), 5002);
        assert_eq!(ErrorCode::ShiftAlreadyOpen.code(), 6002);
        assert_eq!(ErrorCode::OverrideSameStatus.code(), 7001);
        assert_eq!(ErrorCode::InternalError.code(), 9001);
    }

    #[test]
    fn test_is_success() {
        assert!(ErrorCode::Success.is_success());
        assert!(!ErrorCode::AlreadyValidated.is_success());
    }

    #[test]
    fn test_try_from_valid() {
        assert_eq!(ErrorCode::try_from(4001), Ok(ErrorCode::AlreadyValidated));
        assert_eq!(ErrorCode::try_from(7002), Ok(ErrorCode::OverrideRefundPaid));
        assert_eq!(ErrorCode::try_from(9002), Ok(ErrorCode::DatabaseError));
    }

    #[test]
    fn test_try_from_invalid() {
        assert_eq!(ErrorCode::try_from(4999), Err(InvalidErrorCode(4999)));
        // 0xxx 只保留实际使用的通用码
        for retired in [1u16, 5, 6, 7, 8] {
            assert_eq!(ErrorCode::try_from(retired), Err(InvalidErrorCode(retired)));
        }
        assert_eq!(
            InvalidErrorCode(4999).to_string(),
            "invalid error code: 4999"
        );
    }

    #[test]
    fn test_serialize_as_number() {
        let json = serde_json::to_string(&ErrorCode::AlreadyValidated).unwrap();
        assert_eq!(json, "4001");
        let back: ErrorCode = serde_json::from_str("6003").unwrap();
        assert_eq!(back, ErrorCode::ShiftInvalidStatus);
        assert!(serde_json::from_str::<ErrorCode>("4242").is_err());
    }

    #[test]
    fn test_display_and_message() {
        assert_eq!(ErrorCode::VoucherExpired.to_string(), "3004");
        assert_eq!(
            ErrorCode::OverrideReasonTooShort.message(),
            "Override reason must be at least 10 characters"
        );
    }
}
