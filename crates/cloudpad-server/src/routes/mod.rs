//! HTTP control surface.

pub mod cluster;
pub mod grid;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::{Json, Router};
use cloudpad_core::Error;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the main Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(grid::routes())
        .merge(cluster::routes())
}

/// Map a core error to a status code and `{"error": ...}` body.
pub(crate) fn error_response(err: Error) -> (StatusCode, Json<serde_json::Value>) {
    let status = match &err {
        Error::IndexOutOfRange(_) => StatusCode::BAD_REQUEST,
        Error::EmptySlot(_) => StatusCode::NOT_FOUND,
        Error::NoInactiveNode(_) | Error::NoActiveNode(_) => StatusCode::CONFLICT,
        e if e.is_remote() => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(serde_json::json!({ "error": err.to_string() })))
}
