//! Refund settlement record
//!
//! Payment execution happens outside the platform; these records only carry
//! the settlement flags the voucher engine depends on.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum RefundStatus {
    Pending,
    Initiated,
    Paid,
    Failed,
    Cancelled,
}

impl RefundStatus {
    /// Still awaiting settlement
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::Initiated)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum RefundMethod {
    Card,
    BankTransfer,
    MobileMoney,
    Cash,
}

/// Refund record, at most one per voucher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Refund {
    pub id: i64,
    pub voucher_id: i64,
    pub status: RefundStatus,
    pub method: RefundMethod,
    pub currency: String,
    /// VAT amount of the voucher
    pub gross_amount: Decimal,
    pub operator_fee: Decimal,
    /// Amount paid to the traveler
    pub net_amount: Decimal,
    pub initiated_by: String,
    pub paid_at: Option<i64>,
    pub failure_reason: Option<String>,
    pub cancelled_at: Option<i64>,
    pub cancellation_reason: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Initiate refund payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundInitiate {
    pub method: RefundMethod,
}

/// Failed settlement payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundFail {
    pub reason: String,
}
