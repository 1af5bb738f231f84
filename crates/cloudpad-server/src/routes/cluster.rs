//! Cluster mirror route.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use cloudpad_core::GRID_SIZE;

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/cluster", get(get_cluster))
}

/// GET /api/cluster: the adapter's view of the backend.
async fn get_cluster(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let cluster = &state.cluster;
    let apps: Vec<serde_json::Value> = (0..GRID_SIZE)
        .filter(|&i| cluster.app_exists(i))
        .map(|i| {
            serde_json::json!({
                "index": i,
                "replicas": cluster.replicas(i),
                "labels": cluster.labels(i),
            })
        })
        .collect();

    Json(serde_json::json!({
        "service": cluster.kind(),
        "appCount": cluster.app_count(),
        "apps": apps,
        "startedAt": state.started_at.to_rfc3339(),
    }))
}
