//! 凭证过期调度器
//!
//! 启动时扫描一次，之后按固定间隔扫描；把超过 `expires_at` 且仍处于
//! `CREATED / ISSUED / VALIDATION_PENDING` 的凭证置为 `EXPIRED`。

use std::time::Duration;

use serde_json::json;
use shared::AppResult;
use shared::util::now_millis;
use tokio_util::sync::CancellationToken;

use crate::audit::{AuditAction, AuditEvent, AuditStorage};
use crate::db::DbService;
use crate::db::repository::voucher;

/// 过期扫描
#[derive(Clone, Debug)]
pub struct ExpirySweeper {
    db: DbService,
}

impl ExpirySweeper {
    pub fn new(db: DbService) -> Self {
        Self { db }
    }

    /// 扫描一次，返回本次过期的凭证数
    ///
    /// 每张凭证单独一个事务：条件更新失败（并发决策已抢先）则跳过。
    pub async fn sweep(&self, now: i64) -> AppResult<usize> {
        let ids = {
            let mut conn = self.db.conn().await?;
            voucher::find_expirable_ids(&mut conn, now).await?
        };
        if ids.is_empty() {
            return Ok(0);
        }

        let mut expired = 0;
        for id in ids {
            let mut tx = self.db.begin_write().await?;
            if !voucher::expire(&mut tx, id, now).await? {
                tracing::debug!(voucher_id = id, "Voucher changed before expiry, skipped");
                continue;
            }
            AuditStorage::append_in(
                &mut tx,
                AuditEvent::new(AuditAction::VoucherExpired, "voucher", id)
                    .actor("system", "Expiry scheduler")
                    .metadata(json!({ "expired_at": now })),
            )
            .await?;
            tx.commit().await?;
            expired += 1;
        }

        tracing::info!(expired, "Expiry sweep finished");
        Ok(expired)
    }
}

/// 注册为 `TaskKind::Periodic`
pub struct ExpiryScheduler {
    sweeper: ExpirySweeper,
    interval: Duration,
    shutdown: CancellationToken,
}

impl ExpiryScheduler {
    pub fn new(sweeper: ExpirySweeper, interval: Duration, shutdown: CancellationToken) -> Self {
        Self {
            sweeper,
            interval,
            shutdown,
        }
    }

    /// 主循环：启动扫描 + 定时扫描 + 关机信号
    pub async fn run(self) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "Voucher expiry scheduler started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                // 第一次 tick 立即触发 = 启动扫描
                _ = ticker.tick() => {
                    if let Err(e) = self.sweeper.sweep(now_millis()).await {
                        tracing::error!(error = %e, "Expiry sweep failed");
                    }
                }
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Voucher expiry scheduler received shutdown signal");
                    return;
                }
            }
        }
    }
}
