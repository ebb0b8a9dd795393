//! Shift API 模块 (海关班次)

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/shifts", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::list).post(handler::start))
        .route("/current", get(handler::current))
        .route("/{id}/pause", post(handler::pause))
        .route("/{id}/resume", post(handler::resume))
        .route("/{id}/end", post(handler::end))
}
