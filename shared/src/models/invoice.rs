//! Merchant invoice models
//!
//! Invoices are registered by merchants and are immutable afterwards; the
//! voucher engine only reads them.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Merchant approval status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum MerchantStatus {
    Pending,
    Approved,
    Suspended,
}

/// Merchant issuing vouchers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Merchant {
    pub id: i64,
    pub name: String,
    pub status: MerchantStatus,
    pub created_at: i64,
}

/// Create merchant payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerchantCreate {
    pub name: String,
    pub status: MerchantStatus,
}

/// Invoice line item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub id: i64,
    pub invoice_id: i64,
    pub description: String,
    pub category: String,
    pub quantity: i32,
    /// Line total, VAT included
    pub line_total: Decimal,
    pub vat_amount: Decimal,
    pub is_eligible: bool,
}

/// Invoice snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: i64,
    pub merchant_id: i64,
    pub invoice_number: String,
    pub invoice_date: NaiveDate,
    pub currency: String,
    pub total_amount: Decimal,
    pub total_vat: Decimal,
    pub is_cancelled: bool,
    pub items: Vec<InvoiceItem>,
    pub created_at: i64,
}

/// Invoice line payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceItemCreate {
    pub description: String,
    pub category: String,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
    pub line_total: Decimal,
    pub vat_amount: Decimal,
    #[serde(default = "default_eligible")]
    pub is_eligible: bool,
}

fn default_quantity() -> i32 {
    1
}

fn default_eligible() -> bool {
    true
}

/// Register invoice payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceCreate {
    pub merchant_id: i64,
    pub invoice_number: String,
    pub invoice_date: NaiveDate,
    pub currency: String,
    pub items: Vec<InvoiceItemCreate>,
}

impl InvoiceCreate {
    pub fn total_amount(&self) -> Decimal {
        self.items.iter().map(|i| i.line_total).sum()
    }

    pub fn total_vat(&self) -> Decimal {
        self.items.iter().map(|i| i.vat_amount).sum()
    }
}
