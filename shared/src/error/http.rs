//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            // Success
            Self::Success => StatusCode::OK,

            // 404 Not Found
            Self::NotFound
            | Self::VoucherNotFound
            | Self::InvoiceNotFound
            | Self::MerchantNotFound
            | Self::ScanTokenInvalid
            | Self::RefundNotFound
            | Self::ShiftNotFound => StatusCode::NOT_FOUND,

            // 409 Conflict
            Self::AlreadyExists
            | Self::VoucherAlreadyExists
            | Self::AlreadyValidated
            | Self::RefundAlreadyPaid
            | Self::RefundAlreadyExists
            | Self::ShiftAlreadyOpen
            | Self::OverrideSameStatus
            | Self::OverrideRefundPaid => StatusCode::CONFLICT,

            // 401 Unauthorized
            Self::NotAuthenticated | Self::TokenExpired | Self::TokenInvalid => {
                StatusCode::UNAUTHORIZED
            }

            // 403 Forbidden
            Self::PermissionDenied
            | Self::RoleRequired
            | Self::AdminRequired
            | Self::ExitPointRequired => StatusCode::FORBIDDEN,

            // 422 Unprocessable (well-formed request rejected by business state)
            Self::VoucherInvalidStatus
            | Self::VoucherExpired
            | Self::VoucherNotEligible
            | Self::InvoiceCancelled
            | Self::NoActiveRuleSet
            | Self::RefundInvalidStatus
            | Self::ShiftInvalidStatus => StatusCode::UNPROCESSABLE_ENTITY,

            // 500 Internal Server Error
            Self::InternalError | Self::DatabaseError | Self::ConfigError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }

            // 400 Bad Request (default for validation errors)
            _ => StatusCode::BAD_REQUEST,
        }
    }
}
