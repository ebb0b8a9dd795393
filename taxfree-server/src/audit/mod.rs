//! 审计日志模块
//!
//! - [`types`]: 操作类型、事件与条目
//! - [`sanitize`]: 元数据脱敏
//! - [`storage`]: SQLite 哈希链存储

mod sanitize;
mod storage;
mod types;

pub use sanitize::sanitize;
pub use storage::{AuditStorage, AuditStorageError, AuditStorageResult, GENESIS_HASH};
pub use types::{AuditAction, AuditEntry, AuditEvent, AuditQuery, ChainVerification};
