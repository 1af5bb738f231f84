//! Backend selection.

use std::sync::Arc;
use std::time::Duration;

use cloudpad_cluster::{AppEventSender, Cluster, KubernetesCluster, MarathonCluster, OpenShiftCluster};
use cloudpad_core::{BackendKind, CloudpadConfig, Result};
use tracing::info;

/// Build the adapter named by `config.service`. App events go to `events`.
pub fn build_cluster(config: &CloudpadConfig, events: AppEventSender) -> Result<Arc<dyn Cluster>> {
    let retry = Duration::from_millis(config.watch_retry_ms);
    info!("Using {} cluster backend", config.service);

    let cluster: Arc<dyn Cluster> = match config.service {
        BackendKind::Kubernetes => Arc::new(KubernetesCluster::kubernetes(
            &config.kubernetes,
            events,
            retry,
        )?),
        BackendKind::OpenShift => Arc::new(OpenShiftCluster::openshift(
            &config.openshift,
            events,
            retry,
        )?),
        BackendKind::Marathon => Arc::new(MarathonCluster::marathon(&config.marathon, events)?),
    };
    Ok(cluster)
}
