//! Voucher API 模块 (退税凭证)

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/vouchers", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::list).post(handler::create))
        .route("/number/{number}", get(handler::get_by_number))
        .route("/{id}", get(handler::get_by_id))
        .route("/{id}/issue", post(handler::issue))
        .route("/{id}/cancel", post(handler::cancel))
        .route("/{id}/decision", post(handler::record_decision))
        .route("/{id}/validation", get(handler::get_validation))
        .route("/{id}/refund", get(handler::get_refund).post(handler::initiate_refund))
        .route("/{id}/overrides", get(handler::override_history))
        .route("/{id}/available-statuses", get(handler::available_statuses))
}
