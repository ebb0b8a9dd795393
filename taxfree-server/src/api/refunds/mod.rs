//! Refund API 模块 (退款台账)

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/refunds", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/{id}", get(handler::get_by_id))
        .route("/{id}/paid", post(handler::mark_paid))
        .route("/{id}/failed", post(handler::mark_failed))
}
