//! Utility module - logging and input validation

pub mod logger;
pub mod validation;

pub use shared::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};
