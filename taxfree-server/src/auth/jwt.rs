//! JWT 令牌服务
//!
//! 身份由外部账户系统签发，本服务只负责验证并解析出操作人。

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use shared::{AppError, AppResult, ErrorCode};
use thiserror::Error;

/// JWT 配置
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// JWT 密钥 (应至少 32 字节)
    pub secret: String,
    /// 令牌过期时间 (分钟)
    pub expiration_minutes: i64,
    /// 令牌签发者
    pub issuer: String,
    /// 令牌受众
    pub audience: String,
}

/// 操作人角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// 管理员，可执行状态更正
    Admin,
    /// 海关/边境人员
    Agent,
    /// 商户
    Merchant,
    /// 退款运营方
    Operator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Agent => "AGENT",
            Self::Merchant => "MERCHANT",
            Self::Operator => "OPERATOR",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(Self::Admin),
            "AGENT" => Ok(Self::Agent),
            "MERCHANT" => Ok(Self::Merchant),
            "OPERATOR" => Ok(Self::Operator),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// 存储在令牌中的 JWT Claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// 用户 ID (Subject)
    pub sub: String,
    /// 显示名称
    pub name: String,
    /// 角色名称
    pub role: String,
    /// 分配的出境口岸
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_point_id: Option<String>,
    /// 所属商户
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant_id: Option<i64>,
    /// 过期时间戳
    pub exp: i64,
    /// 签发时间戳
    pub iat: i64,
    /// 签发者
    pub iss: String,
    /// 受众
    pub aud: String,
}

/// JWT 错误
#[derive(Error, Debug)]
pub enum JwtError {
    #[error("无效令牌: {0}")]
    InvalidToken(String),

    #[error("令牌已过期")]
    ExpiredToken,

    #[error("无效签名")]
    InvalidSignature,

    #[error("令牌生成失败: {0}")]
    GenerationFailed(String),
}

/// JWT 令牌服务
#[derive(Clone)]
pub struct JwtService {
    pub config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("issuer", &self.config.issuer)
            .field("audience", &self.config.audience)
            .finish_non_exhaustive()
    }
}

impl JwtService {
    /// 使用指定配置创建新的 JWT 服务
    pub fn with_config(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// 为操作人生成令牌（测试与运维工具使用）
    pub fn generate_token(&self, user: &CurrentUser) -> Result<String, JwtError> {
        let now = Utc::now();
        let expiration = now + Duration::minutes(self.config.expiration_minutes);

        let claims = Claims {
            sub: user.id.clone(),
            name: user.name.clone(),
            role: user.role.as_str().to_string(),
            exit_point_id: user.exit_point_id.clone(),
            merchant_id: user.merchant_id,
            exp: expiration.timestamp(),
            iat: now.timestamp(),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| JwtError::GenerationFailed(e.to_string()))
    }

    /// 验证并解码令牌
    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[&self.config.audience]);
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_required_spec_claims(&["sub", "exp", "iat", "iss", "aud"]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::ExpiredToken,
                ErrorKind::InvalidSignature => JwtError::InvalidSignature,
                ErrorKind::InvalidToken => JwtError::InvalidToken(e.to_string()),
                _ => JwtError::InvalidToken(format!("Token validation failed: {}", e)),
            }
        })?;

        Ok(token_data.claims)
    }

    /// 从 Authorization 头提取令牌
    pub fn extract_from_header(header: &str) -> Option<&str> {
        header.strip_prefix("Bearer ")
    }
}

/// 当前操作人 (从 JWT Claims 解析)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    /// 用户 ID
    pub id: String,
    /// 显示名称
    pub name: String,
    pub role: Role,
    /// 出境口岸（海关人员）
    pub exit_point_id: Option<String>,
    /// 所属商户（商户账号）
    pub merchant_id: Option<i64>,
}

impl TryFrom<Claims> for CurrentUser {
    type Error = String;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        Ok(Self {
            role: claims.role.parse()?,
            id: claims.sub,
            name: claims.name,
            exit_point_id: claims.exit_point_id,
            merchant_id: claims.merchant_id,
        })
    }
}

impl CurrentUser {
    /// 系统任务使用的操作人
    pub fn system() -> Self {
        Self {
            id: "system".into(),
            name: "System".into(),
            role: Role::Admin,
            exit_point_id: None,
            merchant_id: None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// 角色检查；管理员总是通过
    pub fn require_role(&self, roles: &[Role]) -> AppResult<()> {
        if self.is_admin() || roles.contains(&self.role) {
            return Ok(());
        }
        Err(AppError::with_message(
            ErrorCode::RoleRequired,
            format!("Role {} may not perform this operation", self.role.as_str()),
        ))
    }

    pub fn require_admin(&self) -> AppResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::new(ErrorCode::AdminRequired))
        }
    }

    /// 海关决定与班次需要口岸
    pub fn require_exit_point(&self) -> AppResult<&str> {
        self.exit_point_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::new(ErrorCode::ExitPointRequired))
    }
}
