//! 认证模块
//!
//! - [`JwtService`] - JWT 令牌验证
//! - [`CurrentUser`] - 当前操作人 (axum extractor)

pub mod extractor;
pub mod jwt;

pub use jwt::{Claims, CurrentUser, JwtConfig, JwtError, JwtService, Role};
