//! Offline Sync API 模块 (离线同步)

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/sync", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", post(handler::sync))
        .route("/history", get(handler::history))
}
