//! 审计日志 SQLite 存储层
//!
//! Append-only 设计，没有任何删除/更新接口 (表上另有触发器拒绝 UPDATE/DELETE)。
//! SHA256 哈希链确保防篡改。

use sha2::{Digest, Sha256};
use sqlx::SqliteConnection;
use thiserror::Error;

use super::sanitize::sanitize;
use super::types::{AuditAction, AuditEntry, AuditEvent, AuditQuery, ChainVerification};
use crate::db::DbService;
use crate::db::repository::{RepoError, page};

/// 哈希链起点
pub const GENESIS_HASH: &str = "genesis";

/// 存储错误
#[derive(Debug, Error)]
pub enum AuditStorageError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<sqlx::Error> for AuditStorageError {
    fn from(err: sqlx::Error) -> Self {
        AuditStorageError::Database(err.to_string())
    }
}

impl From<RepoError> for AuditStorageError {
    fn from(err: RepoError) -> Self {
        AuditStorageError::Database(err.to_string())
    }
}

pub type AuditStorageResult<T> = Result<T, AuditStorageError>;

impl From<AuditStorageError> for shared::AppError {
    fn from(err: AuditStorageError) -> Self {
        shared::AppError::database(err.to_string())
    }
}

#[derive(sqlx::FromRow)]
struct AuditRow {
    sequence: i64,
    timestamp: i64,
    action: String,
    entity_type: String,
    entity_id: String,
    actor_id: Option<String>,
    actor_name: Option<String>,
    metadata: String,
    prev_hash: String,
    curr_hash: String,
}

impl TryFrom<AuditRow> for AuditEntry {
    type Error = AuditStorageError;

    fn try_from(r: AuditRow) -> AuditStorageResult<Self> {
        let action: AuditAction = serde_json::from_value(serde_json::Value::String(r.action))?;
        Ok(AuditEntry {
            sequence: r.sequence,
            timestamp: r.timestamp,
            action,
            entity_type: r.entity_type,
            entity_id: r.entity_id,
            actor_id: r.actor_id,
            actor_name: r.actor_name,
            metadata: serde_json::from_str(&r.metadata)?,
            prev_hash: r.prev_hash,
            curr_hash: r.curr_hash,
        })
    }
}

const SELECT: &str = "SELECT sequence, timestamp, action, entity_type, entity_id, actor_id, actor_name, metadata, prev_hash, curr_hash FROM audit_log";

/// 审计日志存储
///
/// 仅提供 `append` / `list` / `verify_chain`。
#[derive(Clone, Debug)]
pub struct AuditStorage {
    db: DbService,
}

impl AuditStorage {
    pub fn new(db: DbService) -> Self {
        Self { db }
    }

    /// 在调用方的事务中追加一条审计日志
    ///
    /// 事务回滚时该条目一并消失，链不断裂。
    pub async fn append_in(
        conn: &mut SqliteConnection,
        event: AuditEvent,
    ) -> AuditStorageResult<AuditEntry> {
        // 1. 读取当前最大序列号和 last_hash
        let last: Option<(i64, String)> = sqlx::query_as(
            "SELECT sequence, curr_hash FROM audit_log ORDER BY sequence DESC LIMIT 1",
        )
        .fetch_optional(&mut *conn)
        .await?;

        let (sequence, prev_hash) = match last {
            Some((seq, hash)) => (seq + 1, hash),
            None => (1, GENESIS_HASH.to_string()),
        };

        // 2. 计算哈希（所有存储字段参与）
        let timestamp = shared::util::now_millis();
        let metadata = sanitize(event.metadata);
        let metadata_json = serde_json::to_string(&metadata)?;
        let curr_hash = compute_audit_hash(
            &prev_hash,
            sequence,
            timestamp,
            event.action,
            event.entity_type,
            &event.entity_id,
            event.actor_id.as_deref(),
            event.actor_name.as_deref(),
            &metadata_json,
        );

        // 3. 写入
        sqlx::query(
            "INSERT INTO audit_log (sequence, timestamp, action, entity_type, entity_id, actor_id, actor_name, metadata, prev_hash, curr_hash) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(sequence)
        .bind(timestamp)
        .bind(event.action.as_str())
        .bind(event.entity_type)
        .bind(&event.entity_id)
        .bind(&event.actor_id)
        .bind(&event.actor_name)
        .bind(&metadata_json)
        .bind(&prev_hash)
        .bind(&curr_hash)
        .execute(&mut *conn)
        .await?;

        Ok(AuditEntry {
            sequence,
            timestamp,
            action: event.action,
            entity_type: event.entity_type.to_string(),
            entity_id: event.entity_id,
            actor_id: event.actor_id,
            actor_name: event.actor_name,
            metadata,
            prev_hash,
            curr_hash,
        })
    }

    /// 独立追加 (best-effort)：失败只记录日志，不影响调用方
    pub async fn append(&self, event: AuditEvent) -> Option<AuditEntry> {
        let action = event.action;
        match self.append_committed(event).await {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(action = %action, error = %e, "Failed to append audit entry");
                None
            }
        }
    }

    async fn append_committed(&self, event: AuditEvent) -> AuditStorageResult<AuditEntry> {
        let mut tx = self.db.begin_write().await?;
        let entry = Self::append_in(&mut tx, event).await?;
        tx.commit().await?;
        Ok(entry)
    }

    /// 查询审计日志（倒序），返回 (条目, 总数)
    pub async fn list(&self, q: &AuditQuery) -> AuditStorageResult<(Vec<AuditEntry>, i64)> {
        let (limit, offset) = page(q.limit, q.offset);
        let action = q.action.map(|a| a.as_str());
        let filter = "WHERE (?1 IS NULL OR entity_type = ?1) AND (?2 IS NULL OR entity_id = ?2) AND (?3 IS NULL OR action = ?3) AND (?4 IS NULL OR actor_id = ?4)";

        let mut conn = self.db.conn().await?;
        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM audit_log {filter}"))
            .bind(&q.entity_type)
            .bind(&q.entity_id)
            .bind(action)
            .bind(&q.actor_id)
            .fetch_one(&mut *conn)
            .await?;

        let rows = sqlx::query_as::<_, AuditRow>(&format!(
            "{SELECT} {filter} ORDER BY sequence DESC LIMIT ?5 OFFSET ?6"
        ))
        .bind(&q.entity_type)
        .bind(&q.entity_id)
        .bind(action)
        .bind(&q.actor_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *conn)
        .await?;

        let entries = rows
            .into_iter()
            .map(AuditEntry::try_from)
            .collect::<AuditStorageResult<Vec<_>>>()?;
        Ok((entries, total))
    }

    /// 从 genesis 开始逐条重算哈希并校验链接
    pub async fn verify_chain(&self) -> AuditStorageResult<ChainVerification> {
        let mut conn = self.db.conn().await?;
        let rows = sqlx::query_as::<_, AuditRow>(&format!("{SELECT} ORDER BY sequence ASC"))
            .fetch_all(&mut *conn)
            .await?;

        let mut expected_prev = GENESIS_HASH.to_string();
        let mut checked = 0;
        for row in rows {
            checked += 1;
            let action: AuditAction =
                serde_json::from_value(serde_json::Value::String(row.action.clone()))?;
            let recomputed = compute_audit_hash(
                &row.prev_hash,
                row.sequence,
                row.timestamp,
                action,
                &row.entity_type,
                &row.entity_id,
                row.actor_id.as_deref(),
                row.actor_name.as_deref(),
                &row.metadata,
            );
            if row.prev_hash != expected_prev || recomputed != row.curr_hash {
                tracing::error!(sequence = row.sequence, "Audit chain broken");
                return Ok(ChainVerification {
                    entries_checked: checked,
                    valid: false,
                    first_broken_sequence: Some(row.sequence),
                });
            }
            expected_prev = row.curr_hash;
        }

        Ok(ChainVerification {
            entries_checked: checked,
            valid: true,
            first_broken_sequence: None,
        })
    }
}

/// 计算审计条目的 SHA256 哈希
///
/// - 变长字段间用 `\x00` 分隔，防止 `("ab","cd")` 与 `("abc","d")` 碰撞
/// - 定长字段（i64）用 LE 字节序，无需分隔
/// - Optional 字段用 `\x00`=None / `\x01`+bytes=Some 区分
/// - metadata 按存储的 JSON 文本参与哈希
#[allow(clippy::too_many_arguments)]
fn compute_audit_hash(
    prev_hash: &str,
    sequence: i64,
    timestamp: i64,
    action: AuditAction,
    entity_type: &str,
    entity_id: &str,
    actor_id: Option<&str>,
    actor_name: Option<&str>,
    metadata_json: &str,
) -> String {
    let mut hasher = Sha256::new();

    hasher.update(prev_hash.as_bytes());
    hasher.update(b"\x00");

    hasher.update(sequence.to_le_bytes());
    hasher.update(timestamp.to_le_bytes());

    hasher.update(action.as_str().as_bytes());
    hasher.update(b"\x00");

    hasher.update(entity_type.as_bytes());
    hasher.update(b"\x00");
    hasher.update(entity_id.as_bytes());
    hasher.update(b"\x00");

    hash_optional(&mut hasher, actor_id);
    hash_optional(&mut hasher, actor_name);

    hasher.update(metadata_json.as_bytes());
    hasher.update(b"\x00");

    format!("{:x}", hasher.finalize())
}

/// Optional 字段哈希：`\x00` = None, `\x01` + bytes + `\x00` = Some
fn hash_optional(hasher: &mut Sha256, value: Option<&str>) {
    match value {
        Some(v) => {
            hasher.update(b"\x01");
            hasher.update(v.as_bytes());
        }
        None => {
            hasher.update(b"\x00");
        }
    }
    hasher.update(b"\x00");
}
