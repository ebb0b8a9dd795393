use std::time::Duration;

use crate::auth::JwtConfig;
use crate::core::ServerError;
use crate::sync::DEFAULT_MAX_BATCH;

const DEV_TOKEN_SECRET: &str = "dev-only-scan-token-secret-change-me-0123456789";
const DEV_JWT_SECRET: &str = "dev-only-jwt-secret-change-me-0123456789abcdef";

/// 服务器配置
///
/// # 环境变量
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | DATABASE_PATH | taxfree.db | SQLite 数据库文件 |
/// | HTTP_PORT | 3000 | HTTP 服务端口 |
/// | ENVIRONMENT | development | 运行环境 |
/// | TOKEN_SECRET | (开发默认值) | 扫码令牌 HMAC 密钥 |
/// | JWT_SECRET | (开发默认值) | 身份令牌密钥 |
/// | JWT_ISSUER | taxfree-auth | 身份令牌签发者 |
/// | JWT_AUDIENCE | taxfree-clients | 身份令牌受众 |
/// | EXPIRY_SWEEP_INTERVAL_SECS | 3600 | 过期扫描间隔 |
/// | MAX_SYNC_BATCH | 500 | 离线批次最大条数 |
///
/// 日志相关的 LOG_LEVEL / LOG_JSON / LOG_DIR 由 [`crate::setup_environment`] 读取。
///
/// `production` 环境下缺少密钥是启动错误。
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub http_port: u16,
    /// development | staging | production
    pub environment: String,
    /// 扫码令牌签名密钥
    pub token_secret: String,
    pub jwt: JwtConfig,
    pub expiry_sweep_interval: Duration,
    pub max_sync_batch: usize,
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self, ServerError> {
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());
        let production = environment == "production";

        let token_secret = secret_from_env("TOKEN_SECRET", DEV_TOKEN_SECRET, production)?;
        let jwt_secret = secret_from_env("JWT_SECRET", DEV_JWT_SECRET, production)?;

        Ok(Self {
            database_path: std::env::var("DATABASE_PATH").unwrap_or_else(|_| "taxfree.db".into()),
            http_port: parse_env("HTTP_PORT", 3000),
            environment,
            token_secret,
            jwt: JwtConfig {
                secret: jwt_secret,
                expiration_minutes: parse_env("JWT_EXPIRATION_MINUTES", 720),
                issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "taxfree-auth".into()),
                audience: std::env::var("JWT_AUDIENCE")
                    .unwrap_or_else(|_| "taxfree-clients".into()),
            },
            expiry_sweep_interval: Duration::from_secs(
                parse_env::<u64>("EXPIRY_SWEEP_INTERVAL_SECS", 3600).max(1),
            ),
            max_sync_batch: parse_env("MAX_SYNC_BATCH", DEFAULT_MAX_BATCH),
        })
    }

    /// 固定密钥的配置（测试使用）
    pub fn with_secrets(token_secret: impl Into<String>, jwt_secret: impl Into<String>) -> Self {
        Self {
            database_path: ":memory:".into(),
            http_port: 0,
            environment: "test".into(),
            token_secret: token_secret.into(),
            jwt: JwtConfig {
                secret: jwt_secret.into(),
                expiration_minutes: 60,
                issuer: "taxfree-auth".into(),
                audience: "taxfree-clients".into(),
            },
            expiry_sweep_interval: Duration::from_secs(3600),
            max_sync_batch: DEFAULT_MAX_BATCH,
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn secret_from_env(key: &str, dev_default: &str, production: bool) -> Result<String, ServerError> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ if production => Err(ServerError::Config(format!(
            "{key} must be set in production"
        ))),
        _ => {
            tracing::warn!("{key} not set, using the development fallback. DO NOT use in production!");
            Ok(dev_default.to_string())
        }
    }
}
