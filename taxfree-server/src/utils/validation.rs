//! Input validation helpers
//!
//! Centralized text length constants and validation functions.
//! SQLite TEXT has no built-in length enforcement.

use shared::AppError;

// ── Text length limits ──────────────────────────────────────────────

/// Names: travelers, agents, rule sets
pub const MAX_NAME_LEN: usize = 200;

/// Notes, reasons, refusal details
pub const MAX_NOTE_LEN: usize = 500;

/// Short identifiers: invoice numbers, batch ids, reference documents
pub const MAX_SHORT_TEXT_LEN: usize = 100;

/// Email addresses (RFC 5321)
pub const MAX_EMAIL_LEN: usize = 254;

// ── Validation helpers ──────────────────────────────────────────────

/// Validate that a required string is non-empty and within the length limit.
pub fn validate_required_text(value: &str, field: &str, max_len: usize) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{field} must not be empty")));
    }
    if value.len() > max_len {
        return Err(AppError::validation(format!(
            "{field} is too long ({} chars, max {max_len})",
            value.len()
        )));
    }
    Ok(())
}

/// Validate that an optional string, if present, is within the length limit.
pub fn validate_optional_text(
    value: &Option<String>,
    field: &str,
    max_len: usize,
) -> Result<(), AppError> {
    if let Some(v) = value
        && v.len() > max_len
    {
        return Err(AppError::validation(format!(
            "{field} is too long ({} chars, max {max_len})",
            v.len()
        )));
    }
    Ok(())
}

/// ISO 4217 / ISO 3166 style upper-case code of exactly `len` letters
pub fn validate_code(value: &str, field: &str, len: usize) -> Result<(), AppError> {
    if value.len() != len || !value.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(AppError::validation(format!(
            "{field} must be a {len}-letter code"
        )));
    }
    Ok(())
}
