//! Drives a watch adapter over an in-memory backend into the grid and checks
//! the node events that come out.

use std::sync::Arc;
use std::time::Duration;

use cloudpad_cluster::testing::FakeBackend;
use cloudpad_cluster::{app_event_channel, Cluster, WatchedCluster, Workload};
use cloudpad_core::labels::ROW_LABEL;
use cloudpad_core::BackendKind;
use cloudpad_grid::{ClusterNodeGrid, NodeEventKind, NodeEventReceiver};

use NodeEventKind::*;

async fn setup(backend: &FakeBackend) -> (Arc<dyn Cluster>, Arc<ClusterNodeGrid>, NodeEventReceiver) {
    let (tx, rx) = app_event_channel();
    let cluster: Arc<dyn Cluster> = Arc::new(WatchedCluster::new(
        backend.clone(),
        BackendKind::Kubernetes,
        tx,
        Duration::from_millis(20),
    ));
    let grid = Arc::new(ClusterNodeGrid::new(cluster.clone()));
    let events = grid.subscribe();
    grid.initialize();
    grid.clone().spawn_event_loop(rx);
    cluster.start().await.unwrap();
    // Let the watch subscribe.
    tokio::time::sleep(Duration::from_millis(50)).await;
    (cluster, grid, events)
}

async fn next(events: &mut NodeEventReceiver, n: usize) -> Vec<(usize, usize, NodeEventKind)> {
    let mut out = Vec::new();
    for _ in 0..n {
        let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("timed out waiting for node event")
            .expect("node event channel closed");
        out.push((event.row, event.column, event.kind));
    }
    out
}

#[tokio::test]
async fn test_workload_lifecycle() {
    let backend = FakeBackend::new();
    backend.insert(Workload::enabled("web", 2).with_label(ROW_LABEL, "2"));
    let (cluster, grid, mut events) = setup(&backend).await;

    assert_eq!(next(&mut events, 2).await, vec![(2, 0, Started), (2, 1, Started)]);
    assert_eq!(grid.rows(), vec![2]);

    // User starts a node; the backend scales without a rollout.
    grid.start(2, 2).unwrap();
    assert_eq!(next(&mut events, 2).await, vec![(2, 2, Starting), (2, 2, Started)]);
    assert_eq!(backend.scale_calls(), vec![("web".to_string(), 3)]);
    assert_eq!(cluster.replicas(2), Some(3));

    // Someone else scales down; the rollout finishes later.
    backend.upsert(Workload::enabled("web", 1).with_label(ROW_LABEL, "2").with_deploying(true));
    assert_eq!(next(&mut events, 2).await, vec![(2, 2, Stopping), (2, 1, Stopping)]);
    backend.finish_rollout("web");
    assert_eq!(next(&mut events, 2).await, vec![(2, 1, Stopped), (2, 2, Stopped)]);
    assert_eq!(grid.active(2), 1);

    backend.remove("web");
    assert_eq!(next(&mut events, 2).await, vec![(2, 0, Stopping), (2, 0, Stopped)]);
    assert!(grid.rows().is_empty());

    cluster.shutdown();
}

#[tokio::test]
async fn test_scale_waits_for_rollout() {
    let backend = FakeBackend::new();
    backend.insert(Workload::enabled("api", 1));
    backend.rollout_on_scale(true);
    let (cluster, grid, mut events) = setup(&backend).await;
    next(&mut events, 1).await;

    grid.scale(0, 3).unwrap();
    assert_eq!(next(&mut events, 2).await, vec![(0, 1, Starting), (0, 2, Starting)]);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(events.try_recv().is_err());

    backend.finish_rollout("api");
    assert_eq!(next(&mut events, 2).await, vec![(0, 1, Started), (0, 2, Started)]);
    assert_eq!(grid.active(0), 3);
    cluster.shutdown();
}

#[tokio::test]
async fn test_new_workloads_fill_free_rows() {
    let backend = FakeBackend::new();
    backend.insert(Workload::enabled("a", 1).with_label(ROW_LABEL, "0"));
    let (cluster, grid, mut events) = setup(&backend).await;
    next(&mut events, 1).await;

    // Hint collides with row 0, so the lowest free row is used.
    backend.upsert(Workload::enabled("b", 1).with_label(ROW_LABEL, "0"));
    assert_eq!(next(&mut events, 1).await, vec![(1, 0, Started)]);

    // A workload without the enable label stays off the grid until it gains it.
    backend.upsert(Workload::new("c", 2));
    backend.upsert(Workload::enabled("c", 2));
    assert_eq!(next(&mut events, 2).await, vec![(2, 0, Started), (2, 1, Started)]);
    assert_eq!(grid.rows(), vec![0, 1, 2]);
    cluster.shutdown();
}

#[tokio::test]
async fn test_reset_converges() {
    let backend = FakeBackend::new();
    backend.insert(Workload::enabled("web", 2));
    let (cluster, grid, mut events) = setup(&backend).await;
    next(&mut events, 2).await;

    // The backend rejects the scale, so the grid drifts from it.
    backend.fail_scale(true);
    grid.scale(0, 5).unwrap();
    next(&mut events, 3).await;
    assert_eq!(grid.active(0), 5);

    grid.reset();
    let replay = next(&mut events, 12).await;
    let stops: Vec<_> = (0..5)
        .flat_map(|c| [(0, c, Stopping), (0, c, Stopped)])
        .collect();
    assert_eq!(&replay[..10], &stops[..]);
    assert_eq!(&replay[10..], &[(0, 0, Started), (0, 1, Started)]);
    assert_eq!(grid.active(0), 2);
    let before = serde_json::to_value(grid.snapshot()).unwrap();

    grid.reset();
    next(&mut events, 6).await;
    let after = serde_json::to_value(grid.snapshot()).unwrap();
    assert_eq!(before, after);
    assert_eq!(cluster.app_count(), 1);
    cluster.shutdown();
}
