use std::sync::Arc;

use crate::audit::AuditStorage;
use crate::auth::JwtService;
use crate::core::tasks::{BackgroundTasks, TaskKind};
use crate::core::{Config, ServerError};
use crate::db::DbService;
use crate::notify::{DbNotifier, SharedNotificationSink};
use crate::overrides::OverrideAuthority;
use crate::refunds::RefundLedger;
use crate::shifts::ShiftTracker;
use crate::sync::OfflineSyncCoordinator;
use crate::token::TokenSigner;
use crate::vouchers::{ExpiryScheduler, ExpirySweeper, VoucherLifecycle};

/// 服务器状态 - 所有服务的共享句柄
///
/// 各字段均为廉价克隆（连接池 / Arc）。
#[derive(Clone, Debug)]
pub struct ServerState {
    pub config: Config,
    pub db: DbService,
    /// JWT 认证服务 (Arc 共享所有权)
    pub jwt_service: Arc<JwtService>,
    pub vouchers: VoucherLifecycle,
    pub sync: OfflineSyncCoordinator,
    pub shifts: ShiftTracker,
    pub overrides: OverrideAuthority,
    pub refunds: RefundLedger,
    pub audit: AuditStorage,
    pub expiry: ExpirySweeper,
}

impl ServerState {
    /// 打开数据库并组装服务
    pub async fn initialize(config: &Config) -> Result<Self, ServerError> {
        let db = DbService::new(&config.database_path).await?;
        Self::with_db(config.clone(), db)
    }

    /// 使用已有数据库组装（测试使用内存库）
    pub fn with_db(config: Config, db: DbService) -> Result<Self, ServerError> {
        let notifier: SharedNotificationSink = Arc::new(DbNotifier::new(db.clone()));
        Self::with_notifier(config, db, notifier)
    }

    pub fn with_notifier(
        config: Config,
        db: DbService,
        notifier: SharedNotificationSink,
    ) -> Result<Self, ServerError> {
        let signer = TokenSigner::new(config.token_secret.as_bytes())
            .map_err(|e| ServerError::Config(format!("Invalid TOKEN_SECRET: {e}")))?;
        let jwt_service = Arc::new(JwtService::with_config(config.jwt.clone()));

        Ok(Self {
            vouchers: VoucherLifecycle::new(db.clone(), signer.clone()),
            sync: OfflineSyncCoordinator::new(db.clone(), config.max_sync_batch),
            shifts: ShiftTracker::new(db.clone()),
            overrides: OverrideAuthority::new(db.clone(), signer, notifier),
            refunds: RefundLedger::new(db.clone()),
            audit: AuditStorage::new(db.clone()),
            expiry: ExpirySweeper::new(db.clone()),
            jwt_service,
            config,
            db,
        })
    }

    pub fn jwt_service(&self) -> &JwtService {
        &self.jwt_service
    }

    /// 启动后台任务（过期扫描）
    pub fn start_background_tasks(&self) -> BackgroundTasks {
        let mut tasks = BackgroundTasks::new();
        let scheduler = ExpiryScheduler::new(
            self.expiry.clone(),
            self.config.expiry_sweep_interval,
            tasks.shutdown_token(),
        );
        tasks.spawn("voucher_expiry", TaskKind::Periodic, scheduler.run());
        tracing::info!(count = tasks.len(), "Background tasks started");
        tasks
    }
}
