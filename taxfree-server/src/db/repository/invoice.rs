//! Invoice Repository
//!
//! Invoices are immutable after registration apart from the cancelled flag.

use chrono::NaiveDate;
use shared::models::{Invoice, InvoiceCreate, InvoiceItem};
use sqlx::SqliteConnection;

use super::{RepoError, RepoResult, parse_decimal};

#[derive(sqlx::FromRow)]
struct InvoiceRow {
    id: i64,
    merchant_id: i64,
    invoice_number: String,
    invoice_date: NaiveDate,
    currency: String,
    total_amount: String,
    total_vat: String,
    is_cancelled: bool,
    created_at: i64,
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: i64,
    invoice_id: i64,
    description: String,
    category: String,
    quantity: i32,
    line_total: String,
    vat_amount: String,
    is_eligible: bool,
}

impl TryFrom<ItemRow> for InvoiceItem {
    type Error = RepoError;

    fn try_from(r: ItemRow) -> RepoResult<Self> {
        Ok(InvoiceItem {
            id: r.id,
            invoice_id: r.invoice_id,
            description: r.description,
            category: r.category,
            quantity: r.quantity,
            line_total: parse_decimal(&r.line_total, "invoice_items.line_total")?,
            vat_amount: parse_decimal(&r.vat_amount, "invoice_items.vat_amount")?,
            is_eligible: r.is_eligible,
        })
    }
}

pub async fn find_by_id(conn: &mut SqliteConnection, id: i64) -> RepoResult<Option<Invoice>> {
    let row = sqlx::query_as::<_, InvoiceRow>(
        "SELECT id, merchant_id, invoice_number, invoice_date, currency, total_amount, total_vat, is_cancelled, created_at FROM invoices WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let items = sqlx::query_as::<_, ItemRow>(
        "SELECT id, invoice_id, description, category, quantity, line_total, vat_amount, is_eligible FROM invoice_items WHERE invoice_id = ? ORDER BY id",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(InvoiceItem::try_from)
    .collect::<RepoResult<Vec<_>>>()?;

    Ok(Some(Invoice {
        id: row.id,
        merchant_id: row.merchant_id,
        invoice_number: row.invoice_number,
        invoice_date: row.invoice_date,
        currency: row.currency,
        total_amount: parse_decimal(&row.total_amount, "invoices.total_amount")?,
        total_vat: parse_decimal(&row.total_vat, "invoices.total_vat")?,
        is_cancelled: row.is_cancelled,
        items,
        created_at: row.created_at,
    }))
}

/// Register an invoice with its line items
pub async fn create(conn: &mut SqliteConnection, data: InvoiceCreate) -> RepoResult<Invoice> {
    if data.items.is_empty() {
        return Err(RepoError::Validation("Invoice must have at least one item".into()));
    }
    if data.items.iter().any(|i| i.line_total.is_sign_negative() || i.vat_amount.is_sign_negative()) {
        return Err(RepoError::Validation("Invoice amounts cannot be negative".into()));
    }
    if data.items.iter().any(|i| i.quantity <= 0) {
        return Err(RepoError::Validation("Item quantity must be positive".into()));
    }

    let id = shared::util::snowflake_id();
    let now = shared::util::now_millis();
    sqlx::query(
        "INSERT INTO invoices (id, merchant_id, invoice_number, invoice_date, currency, total_amount, total_vat, is_cancelled, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?)",
    )
    .bind(id)
    .bind(data.merchant_id)
    .bind(&data.invoice_number)
    .bind(data.invoice_date)
    .bind(data.currency.to_uppercase())
    .bind(data.total_amount().to_string())
    .bind(data.total_vat().to_string())
    .bind(now)
    .execute(&mut *conn)
    .await?;

    for item in &data.items {
        sqlx::query(
            "INSERT INTO invoice_items (id, invoice_id, description, category, quantity, line_total, vat_amount, is_eligible) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(shared::util::snowflake_id())
        .bind(id)
        .bind(&item.description)
        .bind(item.category.to_uppercase())
        .bind(item.quantity)
        .bind(item.line_total.to_string())
        .bind(item.vat_amount.to_string())
        .bind(item.is_eligible)
        .execute(&mut *conn)
        .await?;
    }

    find_by_id(conn, id)
        .await?
        .ok_or_else(|| RepoError::Database("Failed to create invoice".into()))
}

/// Flag an invoice as cancelled by the merchant
pub async fn cancel(conn: &mut SqliteConnection, id: i64) -> RepoResult<()> {
    let rows = sqlx::query("UPDATE invoices SET is_cancelled = 1 WHERE id = ? AND is_cancelled = 0")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    if rows.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!(
            "Invoice {id} not found or already cancelled"
        )));
    }
    Ok(())
}
