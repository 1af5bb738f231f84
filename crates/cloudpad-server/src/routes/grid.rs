//! Grid routes: node commands, row scaling and grid state.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use cloudpad_grid::GridSnapshot;
use serde::Deserialize;

use super::error_response;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/grid", get(get_grid))
        .route("/rows", get(get_rows))
        .route("/nodes/{row}/{column}/start", post(start_node))
        .route("/nodes/{row}/{column}/stop", post(stop_node))
        .route("/rows/{row}/scale", post(scale_row))
        .route("/reset", post(reset))
}

#[derive(Debug, Deserialize)]
struct ScaleRequest {
    replicas: u32,
}

/// GET /api/grid: every node of every row.
async fn get_grid(State(state): State<Arc<AppState>>) -> Json<GridSnapshot> {
    Json(state.grid.snapshot())
}

/// GET /api/rows: rows backed by a workload.
async fn get_rows(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let rows: Vec<serde_json::Value> = state
        .grid
        .rows()
        .into_iter()
        .map(|row| {
            serde_json::json!({
                "row": row,
                "active": state.grid.active(row),
                "color": state.grid.color(row),
            })
        })
        .collect();
    Json(serde_json::json!({ "rows": rows }))
}

async fn start_node(
    State(state): State<Arc<AppState>>,
    Path((row, column)): Path<(usize, usize)>,
) -> impl IntoResponse {
    match state.grid.start(row, column) {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "row": row, "column": column, "status": "starting" })),
        ),
        Err(e) => error_response(e),
    }
}

async fn stop_node(
    State(state): State<Arc<AppState>>,
    Path((row, column)): Path<(usize, usize)>,
) -> impl IntoResponse {
    match state.grid.stop(row, column) {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "row": row, "column": column, "status": "stopping" })),
        ),
        Err(e) => error_response(e),
    }
}

/// POST /api/rows/{row}/scale: `{"replicas": n}`.
async fn scale_row(
    State(state): State<Arc<AppState>>,
    Path(row): Path<usize>,
    Json(req): Json<ScaleRequest>,
) -> impl IntoResponse {
    match state.grid.scale(row, req.replicas) {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "row": row, "replicas": req.replicas })),
        ),
        Err(e) => error_response(e),
    }
}

async fn reset(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.grid.reset();
    (StatusCode::ACCEPTED, Json(serde_json::json!({ "status": "resetting" })))
}
