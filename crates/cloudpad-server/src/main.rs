//! Cloudpad: cluster workloads on an 8×8 grid.

use std::path::PathBuf;
use std::sync::Arc;

use cloudpad_cluster::app_event_channel;
use cloudpad_core::CloudpadConfig;
use cloudpad_grid::{ClusterNodeGrid, NodeEventReceiver};
use cloudpad_server::{build_cluster, build_router, AppState};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn resolve_config_path() -> PathBuf {
    std::env::var("CLOUDPAD_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("cluster.json"))
}

/// Log every node event. Stands in for a display attached to the grid.
fn spawn_node_logger(mut events: NodeEventReceiver) {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            info!("Node event: {}", event);
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = resolve_config_path();
    info!("Config file: {}", config_path.display());
    let config = CloudpadConfig::load(&config_path)?;
    let port = config.port;

    // Cluster adapter feeds the grid through the app event channel
    let (events_tx, events_rx) = app_event_channel();
    let cluster = build_cluster(&config, events_tx)?;
    let grid = Arc::new(ClusterNodeGrid::new(cluster.clone()));
    spawn_node_logger(grid.subscribe());

    grid.initialize();
    grid.clone().spawn_event_loop(events_rx);
    cluster.start().await?;

    let state = Arc::new(AppState::new(config, cluster.clone(), grid.clone()));
    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Cloudpad server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cluster.shutdown();
    grid.shutdown();
    Ok(())
}
