//! Override API 模块 (管理员状态更正)

mod handler;

use axum::{Router, routing::post};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().route("/api/overrides", post(handler::apply))
}
