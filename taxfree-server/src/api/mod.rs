//! API 路由模块
//!
//! - [`health`] - 健康检查
//! - [`invoices`] - 发票登记
//! - [`vouchers`] - 退税凭证生命周期
//! - [`scan`] - 海关扫码
//! - [`sync`] - 离线同步
//! - [`shifts`] - 海关班次
//! - [`overrides`] - 管理员状态更正
//! - [`refunds`] - 退款台账
//! - [`audit`] - 审计日志

pub mod audit;
pub mod health;
pub mod invoices;
pub mod overrides;
pub mod refunds;
pub mod scan;
pub mod shifts;
pub mod sync;
pub mod vouchers;

use axum::Router;
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::core::ServerState;

/// Build a router with all routes registered (no middleware, no state)
pub fn build_router() -> Router<ServerState> {
    Router::new()
        .merge(health::router())
        .merge(invoices::router())
        .merge(vouchers::router())
        .merge(scan::router())
        .merge(sync::router())
        .merge(shifts::router())
        .merge(overrides::router())
        .merge(refunds::router())
        .merge(audit::router())
}

/// Build the fully configured application
pub fn build_app(state: ServerState) -> Router {
    build_router()
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Paging query shared by list endpoints
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}
