//! Shared types for the tax-free voucher platform
//!
//! Common types used by the server and its clients: error codes,
//! response envelopes, domain models and small utilities.

pub mod error;
pub mod models;
pub mod util;

// Re-exports
pub use axum::{Json, body};
pub use http;
pub use serde::{Deserialize, Serialize};

pub use error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};
