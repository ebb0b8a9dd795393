//! Tax-free voucher model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::rule_set::RuleSnapshot;
use super::traveler::TravelerInput;

/// Voucher lifecycle status
///
/// `CREATED → ISSUED → VALIDATION_PENDING → {VALIDATED, REFUSED} → REFUNDED`,
/// with `EXPIRED` and `CANCELLED` as terminal side-exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum VoucherStatus {
    Created,
    Issued,
    ValidationPending,
    Validated,
    Refused,
    Refunded,
    Expired,
    Cancelled,
}

impl VoucherStatus {
    /// Every status, in lifecycle order
    pub const ALL: [VoucherStatus; 8] = [
        Self::Created,
        Self::Issued,
        Self::ValidationPending,
        Self::Validated,
        Self::Refused,
        Self::Refunded,
        Self::Expired,
        Self::Cancelled,
    ];

    /// Statuses the expiry sweep moves to `EXPIRED`
    pub const EXPIRABLE: [VoucherStatus; 3] =
        [Self::Created, Self::Issued, Self::ValidationPending];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Issued => "ISSUED",
            Self::ValidationPending => "VALIDATION_PENDING",
            Self::Validated => "VALIDATED",
            Self::Refused => "REFUSED",
            Self::Refunded => "REFUNDED",
            Self::Expired => "EXPIRED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Created => "Created",
            Self::Issued => "Issued",
            Self::ValidationPending => "Awaiting validation",
            Self::Validated => "Validated",
            Self::Refused => "Refused",
            Self::Refunded => "Refunded",
            Self::Expired => "Expired",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Statuses in which an agent may record a decision
    pub fn is_scannable(&self) -> bool {
        matches!(self, Self::Issued | Self::ValidationPending)
    }
}

impl fmt::Display for VoucherStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoucherStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown voucher status: {s}"))
    }
}

/// Tax-free voucher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voucher {
    pub id: i64,
    /// `YYYYMM` + 8 random characters, globally unique
    pub voucher_number: String,
    pub invoice_id: i64,
    pub traveler_id: i64,
    pub merchant_id: i64,
    /// Actor who created the voucher
    pub created_by: String,

    pub currency: String,
    pub eligible_amount: Decimal,
    pub vat_amount: Decimal,
    pub operator_fee: Decimal,
    /// `vat_amount - operator_fee`
    pub refund_amount: Decimal,

    pub status: VoucherStatus,
    pub issued_at: Option<i64>,
    pub expires_at: i64,
    pub validated_at: Option<i64>,
    pub cancelled_at: Option<i64>,
    pub cancelled_by: Option<String>,
    pub cancellation_reason: Option<String>,

    /// 0-100
    pub risk_score: i32,
    pub risk_flags: Vec<String>,
    pub requires_control: bool,

    /// Canonical JSON payload of the scan token (set at issuance)
    pub token_payload: Option<String>,
    /// Hex HMAC-SHA256 of `token_payload`
    pub token_signature: Option<String>,

    /// Business rules in force at creation, frozen
    pub rule_snapshot: RuleSnapshot,

    pub created_at: i64,
    pub updated_at: i64,
}

impl Voucher {
    /// Wire form of the scan token: `payload|signature`
    pub fn scan_token(&self) -> Option<String> {
        match (&self.token_payload, &self.token_signature) {
            (Some(payload), Some(signature)) => Some(format!("{payload}|{signature}")),
            _ => None,
        }
    }

    /// A decision may be recorded: scannable status and not yet expired.
    ///
    /// The "no validation exists" half is enforced by storage.
    pub fn is_open_for_decision(&self, now: i64) -> bool {
        self.status.is_scannable() && now < self.expires_at
    }

    pub fn can_be_cancelled(&self) -> bool {
        matches!(self.status, VoucherStatus::Created | VoucherStatus::Issued)
    }
}

/// Create voucher payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoucherCreate {
    pub invoice_id: i64,
    pub traveler: TravelerInput,
}

/// Cancel voucher payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoucherCancel {
    pub reason: String,
}

/// Voucher list filter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VoucherQuery {
    pub status: Option<VoucherStatus>,
    pub merchant_id: Option<i64>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip_str() {
        for status in VoucherStatus::ALL {
            assert_eq!(status.as_str().parse::<VoucherStatus>().unwrap(), status);
        }
        assert!("PENDING".parse::<VoucherStatus>().is_err());
    }

    #[test]
    fn test_status_serde_format() {
        let json = serde_json::to_string(&VoucherStatus::ValidationPending).unwrap();
        assert_eq!(json, "\"VALIDATION_PENDING\"");
    }

    #[test]
    fn test_scannable_statuses() {
        assert!(VoucherStatus::Issued.is_scannable());
        assert!(VoucherStatus::ValidationPending.is_scannable());
        assert!(!VoucherStatus::Created.is_scannable());
        assert!(!VoucherStatus::Validated.is_scannable());
        assert!(!VoucherStatus::Cancelled.is_scannable());
    }
}
