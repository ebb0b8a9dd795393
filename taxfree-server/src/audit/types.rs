//! 审计日志类型定义
//!
//! 所有条目不可变、不可删除，SHA256 哈希链防篡改。

use serde::{Deserialize, Serialize};

/// 审计操作类型（枚举，非自由文本）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    // ═══ 退税单生命周期 ═══
    VoucherCreated,
    VoucherIssued,
    VoucherCancelled,
    VoucherExpired,
    VoucherScanned,

    // ═══ 海关决定 ═══
    CustomsValidated,
    CustomsRefused,
    CustomsControlRequired,
    OfflineSync,

    // ═══ 管理更正 ═══
    StatusOverride,

    // ═══ 退款 ═══
    RefundInitiated,
    RefundPaid,
    RefundFailed,

    // ═══ 班次 ═══
    ShiftStarted,
    ShiftPaused,
    ShiftResumed,
    ShiftEnded,
}

impl AuditAction {
    /// Stable wire name, e.g. `CUSTOMS_VALIDATED`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VoucherCreated => "VOUCHER_CREATED",
            Self::VoucherIssued => "VOUCHER_ISSUED",
            Self::VoucherCancelled => "VOUCHER_CANCELLED",
            Self::VoucherExpired => "VOUCHER_EXPIRED",
            Self::VoucherScanned => "VOUCHER_SCANNED",
            Self::CustomsValidated => "CUSTOMS_VALIDATED",
            Self::CustomsRefused => "CUSTOMS_REFUSED",
            Self::CustomsControlRequired => "CUSTOMS_CONTROL_REQUIRED",
            Self::OfflineSync => "OFFLINE_SYNC",
            Self::StatusOverride => "STATUS_OVERRIDE",
            Self::RefundInitiated => "REFUND_INITIATED",
            Self::RefundPaid => "REFUND_PAID",
            Self::RefundFailed => "REFUND_FAILED",
            Self::ShiftStarted => "SHIFT_STARTED",
            Self::ShiftPaused => "SHIFT_PAUSED",
            Self::ShiftResumed => "SHIFT_RESUMED",
            Self::ShiftEnded => "SHIFT_ENDED",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 待写入的审计事件
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub action: AuditAction,
    /// 实体类型（如 "voucher", "shift"）
    pub entity_type: &'static str,
    pub entity_id: String,
    /// 操作人（系统事件为 None）
    pub actor_id: Option<String>,
    pub actor_name: Option<String>,
    /// 结构化详情，写入前脱敏
    pub metadata: serde_json::Value,
}

impl AuditEvent {
    pub fn new(action: AuditAction, entity_type: &'static str, entity_id: impl ToString) -> Self {
        Self {
            action,
            entity_type,
            entity_id: entity_id.to_string(),
            actor_id: None,
            actor_name: None,
            metadata: serde_json::Value::Object(Default::default()),
        }
    }

    pub fn actor(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.actor_id = Some(id.into());
        self.actor_name = Some(name.into());
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// 审计日志条目（不可变）
///
/// - `prev_hash`: 前一条记录的哈希
/// - `curr_hash`: 当前记录的哈希（包含 prev_hash + 所有字段）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// 全局递增序列号
    pub sequence: i64,
    /// 时间戳（Unix 毫秒）
    pub timestamp: i64,
    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: String,
    pub actor_id: Option<String>,
    pub actor_name: Option<String>,
    pub metadata: serde_json::Value,
    pub prev_hash: String,
    pub curr_hash: String,
}

/// 审计日志查询参数
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditQuery {
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub action: Option<AuditAction>,
    pub actor_id: Option<String>,
    /// 分页偏移
    #[serde(default)]
    pub offset: i64,
    /// 分页大小（默认 50）
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

/// 哈希链校验结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainVerification {
    pub entries_checked: i64,
    pub valid: bool,
    /// 第一条不匹配的序列号
    pub first_broken_sequence: Option<i64>,
}
