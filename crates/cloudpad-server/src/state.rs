//! Shared application state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use cloudpad_cluster::Cluster;
use cloudpad_core::CloudpadConfig;
use cloudpad_grid::ClusterNodeGrid;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: CloudpadConfig,
    pub cluster: Arc<dyn Cluster>,
    pub grid: Arc<ClusterNodeGrid>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: CloudpadConfig, cluster: Arc<dyn Cluster>, grid: Arc<ClusterNodeGrid>) -> Self {
        Self {
            config,
            cluster,
            grid,
            started_at: Utc::now(),
        }
    }
}
