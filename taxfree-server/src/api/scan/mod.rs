//! Scan API 模块 (海关扫码)

mod handler;

use axum::{Router, routing::post};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().route("/api/scan", post(handler::scan))
}
