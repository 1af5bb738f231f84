//! Adapter for backends with a watch API (Kubernetes, OpenShift).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cloudpad_core::{BackendKind, Labels, Result};
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::WatchApi;
use crate::cluster::Cluster;
use crate::event::AppEventSender;
use crate::state::ClusterState;

/// Mirrors a watchable backend. After the initial listing a background task
/// folds every watch notification into the mirror and re-subscribes after
/// `retry` whenever the stream drops.
pub struct WatchedCluster<A: WatchApi> {
    state: Arc<ClusterState<A>>,
    kind: BackendKind,
    retry: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<A: WatchApi> WatchedCluster<A> {
    pub fn new(api: A, kind: BackendKind, events: AppEventSender, retry: Duration) -> Self {
        Self {
            state: Arc::new(ClusterState::new(api, events)),
            kind,
            retry,
            task: Mutex::new(None),
        }
    }

    /// The backend client.
    pub fn api(&self) -> &A {
        &self.state.api
    }
}

async fn watch_loop<A: WatchApi>(state: Arc<ClusterState<A>>, kind: BackendKind, retry: Duration) {
    loop {
        match state.api.watch().await {
            Ok(mut stream) => {
                info!("Watching {} workloads", kind);
                while let Some(item) = stream.next().await {
                    match item {
                        Ok(event) => state.apply_watch_event(event).await,
                        Err(e) => {
                            warn!("{} watch failed: {}", kind, e);
                            break;
                        }
                    }
                }
                debug!("{} watch closed", kind);
            }
            Err(e) => warn!("Could not open {} watch: {}", kind, e),
        }

        // Changes made while disconnected are not replayed by a new
        // subscription.
        if let Err(e) = state.poll().await {
            warn!("{} resync failed: {}", kind, e);
        }
        tokio::time::sleep(retry).await;
    }
}

#[async_trait]
impl<A: WatchApi> Cluster for WatchedCluster<A> {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn start(&self) -> Result<()> {
        self.state.load().await?;

        let handle = tokio::spawn(watch_loop(self.state.clone(), self.kind, self.retry));
        if let Some(previous) = self.task.lock().replace(handle) {
            previous.abort();
        }
        Ok(())
    }

    fn shutdown(&self) {
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
            info!("Stopped {} watch", self.kind);
        }
    }

    fn app_count(&self) -> usize {
        self.state.app_count()
    }

    fn app_exists(&self, index: usize) -> bool {
        self.state.app_exists(index)
    }

    fn replicas(&self, index: usize) -> Option<u32> {
        self.state.replicas(index)
    }

    fn labels(&self, index: usize) -> Labels {
        self.state.labels(index)
    }

    async fn scale(&self, index: usize, replicas: u32) -> Result<()> {
        self.state.scale(index, replicas).await
    }

    async fn reset(&self) -> Result<()> {
        self.state.reset().await
    }

    fn clear(&self) {
        self.state.clear();
    }
}

impl<A: WatchApi> Drop for WatchedCluster<A> {
    fn drop(&mut self) {
        if let Some(handle) = self.task.get_mut().take() {
            handle.abort();
        }
    }
}
