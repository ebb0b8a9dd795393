//! Tax-free Server - 免税退税凭证服务
//!
//! # 架构概述
//!
//! 游客在商户消费后获得退税凭证，离境时由海关扫码验证，验证通过后退款。
//!
//! - **凭证** (`vouchers`): 创建、签发、海关决定、取消、过期
//! - **资格** (`eligibility`): 纯函数资格检查
//! - **扫码令牌** (`token`): HMAC 签名的凭证载荷
//! - **离线同步** (`sync`): 断网期间的决定批量提交
//! - **班次** (`shifts`) / **状态更正** (`overrides`) / **退款** (`refunds`)
//! - **审计** (`audit`): 哈希链审计日志
//!
//! # 模块结构
//!
//! ```text
//! taxfree-server/src/
//! ├── core/          # 配置、状态、后台任务、错误
//! ├── auth/          # JWT 验证、当前操作人
//! ├── api/           # HTTP 路由和处理器
//! ├── db/            # SQLite 连接池和仓储
//! ├── audit/         # 审计日志
//! ├── eligibility/   # 资格规则
//! ├── vouchers/      # 凭证生命周期、规则集、过期扫描
//! └── utils/         # 日志、输入校验
//! ```

pub mod api;
pub mod audit;
pub mod auth;
pub mod core;
pub mod db;
pub mod eligibility;
pub mod notify;
pub mod overrides;
pub mod refunds;
pub mod shifts;
pub mod sync;
pub mod token;
pub mod utils;
pub mod vouchers;

// Re-export 公共类型
pub use auth::{CurrentUser, JwtService, Role};
pub use core::{Config, Server, ServerState};
pub use db::DbService;
pub use token::TokenSigner;
pub use utils::{AppError, AppResult};

// Re-export unified error types from shared
pub use utils::{ApiResponse, ErrorCategory, ErrorCode};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

// Security logging macro - 支持 tracing 格式说明符
#[macro_export]
macro_rules! security_log {
    ($level:expr, $event:expr, $($key:ident = $value:expr),*) => {
        tracing::info!(
            target: "security",
            level = $level,
            event = $event,
            $($key = $value),*
        );
    };
}

/// 加载 `.env` 并初始化日志
///
/// 在读取 [`Config`] 之前调用，配置加载过程中的警告才能被记录。
pub fn setup_environment() {
    dotenv::dotenv().ok();

    let level = std::env::var("LOG_LEVEL").ok();
    let json = std::env::var("LOG_JSON").is_ok_and(|v| v == "1" || v == "true");
    let dir = std::env::var("LOG_DIR").ok().filter(|d| !d.is_empty());
    init_logger_with_file(level.as_deref(), json, dir.as_deref());
}
