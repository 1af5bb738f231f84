//! Marathon adapter: keeps the mirror current by polling the app listing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cloudpad_core::{BackendKind, Labels, MarathonSettings, Result};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info};

use crate::api::WorkloadApi;
use crate::cluster::Cluster;
use crate::event::AppEventSender;
use crate::marathon::client::MarathonClient;
use crate::state::ClusterState;

/// Polling adapter. Every `interval` the full app listing is diffed against
/// the mirror.
pub struct MarathonCluster<A: WorkloadApi = MarathonClient> {
    state: Arc<ClusterState<A>>,
    interval: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl MarathonCluster<MarathonClient> {
    pub fn marathon(settings: &MarathonSettings, events: AppEventSender) -> Result<Self> {
        let client = MarathonClient::new(settings)?;
        info!("Marathon client for {}", client.endpoint());
        Ok(Self::new(
            client,
            events,
            Duration::from_millis(settings.poll_interval_ms),
        ))
    }
}

impl<A: WorkloadApi> MarathonCluster<A> {
    pub fn new(api: A, events: AppEventSender, interval: Duration) -> Self {
        Self {
            state: Arc::new(ClusterState::new(api, events)),
            interval,
            task: Mutex::new(None),
        }
    }

    pub fn api(&self) -> &A {
        &self.state.api
    }
}

async fn poll_loop<A: WorkloadApi>(state: Arc<ClusterState<A>>, period: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if let Err(e) = state.poll().await {
            error!("Failed to update Marathon apps: {}", e);
        }
    }
}

#[async_trait]
impl<A: WorkloadApi> Cluster for MarathonCluster<A> {
    fn kind(&self) -> BackendKind {
        BackendKind::Marathon
    }

    async fn start(&self) -> Result<()> {
        self.state.load().await?;

        let handle = tokio::spawn(poll_loop(self.state.clone(), self.interval));
        if let Some(previous) = self.task.lock().replace(handle) {
            previous.abort();
        }
        info!("Polling Marathon every {:?}", self.interval);
        Ok(())
    }

    fn shutdown(&self) {
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
            info!("Stopped Marathon polling");
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

impl<A: WorkloadApi> Drop for MarathonCluster<A> {
    fn drop(&mut self) {
        if let Some(handle) = self.task.get_mut().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{app_event_channel, AppEventType};
    use crate::testing::FakeBackend;
    use crate::workload::Workload;

    const TICK: Duration = Duration::from_millis(20);

    #[tokio::test]
    async fn test_poll_detects_changes() {
        let backend = FakeBackend::new();
        backend.insert(Workload::enabled("/web", 1));
        let (tx, mut rx) = app_event_channel();
        let cluster = MarathonCluster::new(backend.clone(), tx, TICK);

        cluster.start().await.unwrap();
        assert_eq!(rx.recv().await.unwrap().kind, AppEventType::Added);

        backend.insert(Workload::enabled("/web", 4));
        backend.insert(Workload::enabled("/api", 2));

        let up = rx.recv().await.unwrap();
        assert_eq!((up.index, up.kind, up.replicas), (0, AppEventType::ScaledUp, 4));
        let added = rx.recv().await.unwrap();
        assert_eq!((added.index, added.kind), (1, AppEventType::Added));
        cluster.shutdown();
    }

    #[tokio::test]
    async fn test_poll_detects_deletion_and_reuses_row() {
        let backend = FakeBackend::new();
        backend.insert(Workload::enabled("/a", 1));
        backend.insert(Workload::enabled("/b", 1));
        let (tx, mut rx) = app_event_channel();
        let cluster = MarathonCluster::new(backend.clone(), tx, TICK);
        cluster.start().await.unwrap();
        rx.recv().await.unwrap();
        rx.recv().await.unwrap();

        backend.remove("/a");
        let deleted = rx.recv().await.unwrap();
        assert_eq!((deleted.index, deleted.kind, deleted.replicas), (0, AppEventType::Deleted, 0));

        backend.insert(Workload::enabled("/c", 1));
        let added = rx.recv().await.unwrap();
        assert_eq!((added.index, added.kind), (0, AppEventType::Added));
        cluster.shutdown();
    }

    #[tokio::test]
    async fn test_scale_then_rollout_completes() {
        let backend = FakeBackend::new();
        backend.insert(Workload::enabled("/web", 1));
        backend.rollout_on_scale(true);
        let (tx, mut rx) = app_event_channel();
        let cluster = MarathonCluster::new(backend.clone(), tx, TICK);
        cluster.start().await.unwrap();
        rx.recv().await.unwrap();

        cluster.scale(0, 3).await.unwrap();
        assert_eq!(cluster.replicas(0), Some(3));

        backend.finish_rollout("/web");
        let deployed = rx.recv().await.unwrap();
        assert_eq!((deployed.kind, deployed.replicas), (AppEventType::Deployed, 3));
        cluster.shutdown();
    }

    #[tokio::test]
    async fn test_failed_poll_keeps_mirror() {
        let backend = FakeBackend::new();
        backend.insert(Workload::enabled("/web", 2));
        let (tx, mut rx) = app_event_channel();
        let cluster = MarathonCluster::new(backend.clone(), tx, TICK);
        cluster.start().await.unwrap();
        rx.recv().await.unwrap();

        backend.fail_list(true);
        tokio::time::sleep(TICK * 3).await;
        assert_eq!(cluster.replicas(0), Some(2));
        assert!(rx.try_recv().is_err());

        backend.fail_list(false);
        backend.insert(Workload::enabled("/web", 1));
        let down = rx.recv().await.unwrap();
        assert_eq!(down.kind, AppEventType::ScaledDown);
        cluster.shutdown();
    }

    #[tokio::test]
    async fn test_shutdown_stops_polling() {
        let backend = FakeBackend::new();
        let (tx, mut rx) = app_event_channel();
        let cluster = MarathonCluster::new(backend.clone(), tx, TICK);
        cluster.start().await.unwrap();
        cluster.shutdown();

        backend.insert(Workload::enabled("/late", 1));
        tokio::time::sleep(TICK * 3).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(cluster.kind(), BackendKind::Marathon);
    }
}
