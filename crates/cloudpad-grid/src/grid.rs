//! The 8×8 cluster node grid.
//!
//! Each row mirrors the workload the cluster placed at the same index; each
//! column is one replica. App events from the cluster are folded into node
//! state and re-published as node events. User commands mutate the grid
//! optimistically and forward a scale request to the cluster.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cloudpad_cluster::{AppEvent, AppEventReceiver, AppEventType, Cluster};
use cloudpad_core::{labels, Error, Result, GRID_SIZE};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::color::RowColor;
use crate::event::{NodeEvent, NodeEventKind, NodeEventReceiver, NodeEventSender};
use crate::node::{ClusterNode, Phase};

type Row = [ClusterNode; GRID_SIZE];

struct GridState {
    nodes: [Row; GRID_SIZE],
    colors: [RowColor; GRID_SIZE],
}

impl GridState {
    fn new() -> Self {
        Self {
            nodes: std::array::from_fn(|row| std::array::from_fn(|column| ClusterNode::new(row, column))),
            colors: std::array::from_fn(RowColor::default_for_row),
        }
    }
}

/// Point-in-time view of one row.
#[derive(Debug, Clone, Serialize)]
pub struct RowSnapshot {
    pub row: usize,
    pub deployed: bool,
    pub color: RowColor,
    pub active: usize,
    pub nodes: Vec<ClusterNode>,
}

/// Point-in-time view of the whole grid.
#[derive(Debug, Clone, Serialize)]
pub struct GridSnapshot {
    pub initialized: bool,
    pub rows: Vec<RowSnapshot>,
}

pub struct ClusterNodeGrid {
    cluster: Arc<dyn Cluster>,
    initialized: AtomicBool,
    state: Mutex<GridState>,
    subscribers: Mutex<Vec<NodeEventSender>>,
}

fn check_row(row: usize) -> Result<()> {
    if row < GRID_SIZE {
        Ok(())
    } else {
        Err(Error::IndexOutOfRange(row))
    }
}

fn check_node(row: usize, column: usize) -> Result<()> {
    check_row(row)?;
    if column < GRID_SIZE {
        Ok(())
    } else {
        Err(Error::IndexOutOfRange(column))
    }
}

fn live_count(nodes: &Row) -> usize {
    nodes.iter().filter(|n| n.is_live()).count()
}

/// Move up to `count` inactive nodes (lowest first) to `Pending`.
fn start_nodes(nodes: &mut Row, count: usize, out: &mut Vec<NodeEvent>) {
    for node in nodes.iter_mut().filter(|n| !n.active).take(count) {
        node.activate().update(Phase::Pending);
        out.push(NodeEvent::new(node.row, node.column, NodeEventKind::Starting));
    }
}

/// Move up to `count` live nodes (highest first) to `Succeeded`.
fn stop_nodes(nodes: &mut Row, count: usize, out: &mut Vec<NodeEvent>) {
    for node in nodes.iter_mut().rev().filter(|n| n.is_live()).take(count) {
        node.update(Phase::Succeeded);
        out.push(NodeEvent::new(node.row, node.column, NodeEventKind::Stopping));
    }
}

impl ClusterNodeGrid {
    pub fn new(cluster: Arc<dyn Cluster>) -> Self {
        Self {
            cluster,
            initialized: AtomicBool::new(false),
            state: Mutex::new(GridState::new()),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Accept app events from now on.
    pub fn initialize(&self) {
        info!("Initialize {}x{} cluster node grid.", GRID_SIZE, GRID_SIZE);
        self.initialized.store(true, Ordering::SeqCst);
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Deactivate every node. No node events are emitted.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        for node in state.nodes.iter_mut().flatten() {
            node.deactivate();
        }
        self.initialized.store(false, Ordering::SeqCst);
        info!("Cluster node grid shut down");
    }

    /// Receive every node event emitted from now on.
    pub fn subscribe(&self) -> NodeEventReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Fold app events from `events` into the grid until the channel closes.
    pub fn spawn_event_loop(self: Arc<Self>, mut events: AppEventReceiver) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                self.on_app_event(&event);
            }
            debug!("App event channel closed");
        })
    }

    // ---------------------------------------------------------------
    // Commands
    // ---------------------------------------------------------------

    /// Start the node at `(row, column)` and ask the cluster for one more
    /// replica. Starting a live node does nothing.
    pub fn start(&self, row: usize, column: usize) -> Result<()> {
        check_node(row, column)?;
        self.check_deployed(row)?;
        info!("Start cluster node ({}, {})", row, column);

        let mut state = self.state.lock();
        let nodes = &mut state.nodes[row];
        if nodes[column].is_live() {
            debug!("Node ({}, {}) already live", row, column);
            return Ok(());
        }

        let running = live_count(nodes);
        nodes[column].activate().update(Phase::Pending);
        self.publish(&[NodeEvent::new(row, column, NodeEventKind::Starting)]);
        self.dispatch_scale(row, (running + 1) as u32);
        Ok(())
    }

    /// Stop the node at `(row, column)` and ask the cluster for one replica
    /// less. Stopping a node that is not live does nothing.
    pub fn stop(&self, row: usize, column: usize) -> Result<()> {
        check_node(row, column)?;
        info!("Stop cluster node ({}, {})", row, column);

        let mut state = self.state.lock();
        let nodes = &mut state.nodes[row];
        if !nodes[column].is_live() {
            debug!("Node ({}, {}) is not live", row, column);
            return Ok(());
        }

        let running = live_count(nodes);
        nodes[column].update(Phase::Succeeded);
        self.publish(&[NodeEvent::new(row, column, NodeEventKind::Stopping)]);
        self.dispatch_scale(row, running.saturating_sub(1) as u32);
        Ok(())
    }

    /// Ask the cluster for `replicas` in `row`, then reflect the change
    /// locally without waiting for the answer.
    pub fn scale(&self, row: usize, replicas: u32) -> Result<()> {
        check_row(row)?;
        self.check_deployed(row)?;
        info!("Scale row {} to {} replicas", row, replicas);

        let mut state = self.state.lock();
        self.dispatch_scale(row, replicas);

        let nodes = &mut state.nodes[row];
        let running = live_count(nodes);
        let wanted = (replicas as usize).min(GRID_SIZE);
        let mut out = Vec::new();
        if running > wanted {
            stop_nodes(nodes, running - wanted, &mut out);
        } else if running < wanted {
            start_nodes(nodes, wanted - running, &mut out);
        }
        self.publish(&out);
        Ok(())
    }

    /// Ask the cluster to rebuild its mirror. The resulting app events
    /// bring the grid back in line.
    pub fn reset(&self) {
        info!("Reset cluster");
        let cluster = self.cluster.clone();
        tokio::spawn(async move {
            if let Err(e) = cluster.reset().await {
                error!("Cluster reset failed: {}", e);
            }
        });
    }

    /// Nodes in a row without a workload would never see an app event.
    fn check_deployed(&self, row: usize) -> Result<()> {
        if self.cluster.app_exists(row) {
            Ok(())
        } else {
            warn!("No app deployed in row {}", row);
            Err(Error::EmptySlot(row))
        }
    }

    fn dispatch_scale(&self, row: usize, replicas: u32) {
        let cluster = self.cluster.clone();
        tokio::spawn(async move {
            if let Err(e) = cluster.scale(row, replicas).await {
                error!("Scaling row {} to {} failed: {}", row, replicas, e);
            }
        });
    }

    // ---------------------------------------------------------------
    // App events
    // ---------------------------------------------------------------

    /// Fold one app event into the grid.
    pub fn on_app_event(&self, event: &AppEvent) {
        if !self.is_initialized() {
            debug!("Ignoring event {:?}.", event);
            return;
        }
        if event.index >= GRID_SIZE {
            warn!("Ignoring event for row {} outside the grid", event.index);
            return;
        }

        let row = event.index;
        let replicas = (event.replicas as usize).min(GRID_SIZE);
        let mut state = self.state.lock();
        let mut out = Vec::new();

        match event.kind {
            AppEventType::Added => {
                if let Some(name) = labels::color(&event.labels) {
                    match name.parse::<RowColor>() {
                        Ok(color) => state.colors[row] = color,
                        Err(_) => error!("Unknown color: {}!", name),
                    }
                }

                for node in state.nodes[row].iter_mut() {
                    if node.column < replicas {
                        node.activate();
                        out.push(NodeEvent::new(row, node.column, NodeEventKind::Started));
                    } else if node.active {
                        node.deactivate();
                        out.push(NodeEvent::new(row, node.column, NodeEventKind::Stopped));
                    }
                }
            }

            AppEventType::Deleted => {
                for node in state.nodes[row].iter_mut().filter(|n| n.active) {
                    out.push(NodeEvent::new(row, node.column, NodeEventKind::Stopping));
                    node.deactivate();
                    out.push(NodeEvent::new(row, node.column, NodeEventKind::Stopped));
                }
            }

            AppEventType::ScaledUp => {
                let nodes = &mut state.nodes[row];
                let running = live_count(nodes);
                start_nodes(nodes, replicas.saturating_sub(running), &mut out);
            }

            AppEventType::ScaledDown => {
                let nodes = &mut state.nodes[row];
                let running = live_count(nodes);
                stop_nodes(nodes, running.saturating_sub(replicas), &mut out);
            }

            AppEventType::Deployed => {
                for node in state.nodes[row].iter_mut() {
                    match node.phase {
                        Phase::Pending => {
                            node.update(Phase::Running);
                            out.push(NodeEvent::new(row, node.column, NodeEventKind::Started));
                        }
                        Phase::Succeeded => {
                            node.deactivate();
                            out.push(NodeEvent::new(row, node.column, NodeEventKind::Stopped));
                        }
                        _ => {}
                    }
                }
            }
        }

        debug!("{:?} on row {} -> {} node events", event.kind, row, out.len());
        self.publish(&out);
    }

    /// Called with the state lock held so per-row order is preserved.
    fn publish(&self, events: &[NodeEvent]) {
        if events.is_empty() {
            return;
        }
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| events.iter().all(|e| tx.send(*e).is_ok()));
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    /// Lowest inactive column of `row`.
    pub fn next(&self, row: usize) -> Result<usize> {
        check_row(row)?;
        self.state.lock().nodes[row]
            .iter()
            .find(|n| !n.active)
            .map(|n| n.column)
            .ok_or(Error::NoInactiveNode(row))
    }

    /// Highest live column of `row`.
    pub fn last(&self, row: usize) -> Result<usize> {
        check_row(row)?;
        self.state.lock().nodes[row]
            .iter()
            .rev()
            .find(|n| n.is_live())
            .map(|n| n.column)
            .ok_or(Error::NoActiveNode(row))
    }

    pub fn get(&self, row: usize) -> Result<Row> {
        check_row(row)?;
        Ok(self.state.lock().nodes[row])
    }

    /// Number of live nodes in `row`.
    pub fn active(&self, row: usize) -> usize {
        self.state
            .lock()
            .nodes
            .get(row)
            .map_or(0, live_count)
    }

    /// Whether a workload backs `row`.
    pub fn row_initialized(&self, row: usize) -> bool {
        self.cluster.app_exists(row)
    }

    /// Rows backed by a workload, ascending.
    pub fn rows(&self) -> Vec<usize> {
        (0..GRID_SIZE).filter(|&r| self.cluster.app_exists(r)).collect()
    }

    pub fn color(&self, row: usize) -> RowColor {
        self.state
            .lock()
            .colors
            .get(row)
            .copied()
            .unwrap_or(RowColor::LightGreen)
    }

    pub fn snapshot(&self) -> GridSnapshot {
        let deployed: Vec<bool> = (0..GRID_SIZE).map(|r| self.cluster.app_exists(r)).collect();
        let state = self.state.lock();
        let rows = (0..GRID_SIZE)
            .map(|row| RowSnapshot {
                row,
                deployed: deployed[row],
                color: state.colors[row],
                active: live_count(&state.nodes[row]),
                nodes: state.nodes[row].to_vec(),
            })
            .collect();
        GridSnapshot {
            initialized: self.is_initialized(),
            rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cloudpad_core::{BackendKind, Labels};
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Cluster double that records scale requests. When `gate` is set every
    /// scale waits for it before returning.
    struct RecordingCluster {
        apps: Mutex<[Option<u32>; GRID_SIZE]>,
        calls: mpsc::UnboundedSender<(usize, u32)>,
        resets: mpsc::UnboundedSender<()>,
        gate: Option<Arc<Notify>>,
    }

    struct Recorded {
        calls: mpsc::UnboundedReceiver<(usize, u32)>,
        resets: mpsc::UnboundedReceiver<()>,
    }

    fn recording(gate: Option<Arc<Notify>>) -> (Arc<RecordingCluster>, Recorded) {
        let (calls_tx, calls) = mpsc::unbounded_channel();
        let (resets_tx, resets) = mpsc::unbounded_channel();
        let cluster = Arc::new(RecordingCluster {
            apps: Mutex::new([None; GRID_SIZE]),
            calls: calls_tx,
            resets: resets_tx,
            gate,
        });
        (cluster, Recorded { calls, resets })
    }

    #[async_trait]
    impl Cluster for RecordingCluster {
        fn kind(&self) -> BackendKind {
            BackendKind::Kubernetes
        }
        async fn start(&self) -> Result<()> {
            Ok(())
        }
        fn shutdown(&self) {}
        fn app_count(&self) -> usize {
            self.apps.lock().iter().filter(|a| a.is_some()).count()
        }
        fn app_exists(&self, index: usize) -> bool {
            self.apps.lock().get(index).map_or(false, |a| a.is_some())
        }
        fn replicas(&self, index: usize) -> Option<u32> {
            self.apps.lock().get(index).copied().flatten()
        }
        fn labels(&self, _index: usize) -> Labels {
            Labels::new()
        }
        async fn scale(&self, index: usize, replicas: u32) -> Result<()> {
            if index >= GRID_SIZE {
                return Err(Error::IndexOutOfRange(index));
            }
            if self.apps.lock()[index].is_none() {
                return Err(Error::EmptySlot(index));
            }
            let _ = self.calls.send((index, replicas));
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.apps.lock()[index] = Some(replicas);
            Ok(())
        }
        async fn reset(&self) -> Result<()> {
            let _ = self.resets.send(());
            Ok(())
        }
        fn clear(&self) {
            *self.apps.lock() = [None; GRID_SIZE];
        }
    }

    fn grid(cluster: &Arc<RecordingCluster>) -> (ClusterNodeGrid, NodeEventReceiver) {
        let grid = ClusterNodeGrid::new(cluster.clone());
        grid.initialize();
        let rx = grid.subscribe();
        (grid, rx)
    }

    fn event(index: usize, replicas: u32, kind: AppEventType) -> AppEvent {
        AppEvent::new(index, replicas, Labels::new(), kind)
    }

    fn drain(rx: &mut NodeEventReceiver) -> Vec<(usize, usize, NodeEventKind)> {
        let mut out = Vec::new();
        while let Ok(e) = rx.try_recv() {
            out.push((e.row, e.column, e.kind));
        }
        out
    }

    fn columns(grid: &ClusterNodeGrid, row: usize, phase: Phase) -> Vec<usize> {
        grid.get(row)
            .unwrap()
            .iter()
            .filter(|n| n.active && n.phase == phase)
            .map(|n| n.column)
            .collect()
    }

    #[tokio::test]
    async fn test_added_activates_nodes() {
        let (cluster, _recorded) = recording(None);
        let (grid, mut rx) = grid(&cluster);

        grid.on_app_event(&event(2, 3, AppEventType::Added));

        use NodeEventKind::*;
        assert_eq!(
            drain(&mut rx),
            vec![(2, 0, Started), (2, 1, Started), (2, 2, Started)]
        );
        assert_eq!(columns(&grid, 2, Phase::Running), vec![0, 1, 2]);
        assert_eq!(grid.active(2), 3);
        assert!(grid.get(2).unwrap()[3..].iter().all(|n| !n.active));
    }

    #[tokio::test]
    async fn test_scaled_up_starts_lowest_inactive() {
        let (cluster, _recorded) = recording(None);
        let (grid, mut rx) = grid(&cluster);
        grid.on_app_event(&event(2, 3, AppEventType::Added));
        drain(&mut rx);

        grid.on_app_event(&event(2, 5, AppEventType::ScaledUp));

        use NodeEventKind::*;
        assert_eq!(drain(&mut rx), vec![(2, 3, Starting), (2, 4, Starting)]);
        assert_eq!(columns(&grid, 2, Phase::Running), vec![0, 1, 2]);
        assert_eq!(columns(&grid, 2, Phase::Pending), vec![3, 4]);
        assert_eq!(grid.active(2), 5);
    }

    #[tokio::test]
    async fn test_scaled_up_is_capped() {
        let (cluster, _recorded) = recording(None);
        let (grid, mut rx) = grid(&cluster);
        grid.on_app_event(&event(0, 6, AppEventType::Added));
        drain(&mut rx);

        grid.on_app_event(&event(0, 20, AppEventType::ScaledUp));
        assert_eq!(drain(&mut rx).len(), 2);
        assert_eq!(grid.active(0), GRID_SIZE);
        assert!(matches!(grid.next(0), Err(Error::NoInactiveNode(0))));
    }

    #[tokio::test]
    async fn test_scaled_down_stops_highest_first() {
        let (cluster, _recorded) = recording(None);
        let (grid, mut rx) = grid(&cluster);
        grid.on_app_event(&event(2, 5, AppEventType::Added));
        drain(&mut rx);

        grid.on_app_event(&event(2, 2, AppEventType::ScaledDown));

        use NodeEventKind::*;
        assert_eq!(
            drain(&mut rx),
            vec![(2, 4, Stopping), (2, 3, Stopping), (2, 2, Stopping)]
        );
        assert_eq!(columns(&grid, 2, Phase::Succeeded), vec![2, 3, 4]);
        assert_eq!(grid.active(2), 2);
        assert_eq!(grid.last(2).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_scaled_down_skips_nodes_already_stopping() {
        let (cluster, _recorded) = recording(None);
        let (grid, mut rx) = grid(&cluster);
        grid.on_app_event(&event(1, 4, AppEventType::Added));
        grid.on_app_event(&event(1, 3, AppEventType::ScaledDown));
        drain(&mut rx);

        grid.on_app_event(&event(1, 1, AppEventType::ScaledDown));

        use NodeEventKind::*;
        assert_eq!(drain(&mut rx), vec![(1, 2, Stopping), (1, 1, Stopping)]);
        assert_eq!(grid.active(1), 1);
    }

    #[tokio::test]
    async fn test_deployed_settles_nodes() {
        let (cluster, _recorded) = recording(None);
        let (grid, mut rx) = grid(&cluster);
        grid.on_app_event(&event(3, 3, AppEventType::Added));
        grid.on_app_event(&event(3, 5, AppEventType::ScaledUp));
        grid.on_app_event(&event(3, 4, AppEventType::ScaledDown));
        drain(&mut rx);

        grid.on_app_event(&event(3, 4, AppEventType::Deployed));

        use NodeEventKind::*;
        assert_eq!(drain(&mut rx), vec![(3, 3, Started), (3, 4, Stopped)]);
        assert_eq!(columns(&grid, 3, Phase::Running), vec![0, 1, 2, 3]);
        assert_eq!(grid.active(3), 4);
    }

    #[tokio::test]
    async fn test_deleted_stops_every_active_node() {
        let (cluster, _recorded) = recording(None);
        let (grid, mut rx) = grid(&cluster);
        grid.on_app_event(&event(5, 2, AppEventType::Added));
        drain(&mut rx);

        grid.on_app_event(&event(5, 0, AppEventType::Deleted));

        use NodeEventKind::*;
        assert_eq!(
            drain(&mut rx),
            vec![(5, 0, Stopping), (5, 0, Stopped), (5, 1, Stopping), (5, 1, Stopped)]
        );
        assert_eq!(grid.active(5), 0);
        assert!(grid.last(5).is_err());
    }

    #[tokio::test]
    async fn test_events_ignored_before_initialize() {
        let (cluster, _recorded) = recording(None);
        let grid = ClusterNodeGrid::new(cluster.clone());
        let mut rx = grid.subscribe();

        grid.on_app_event(&event(0, 3, AppEventType::Added));
        assert!(drain(&mut rx).is_empty());
        assert_eq!(grid.active(0), 0);

        grid.initialize();
        grid.on_app_event(&event(9, 3, AppEventType::Added));
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_color_override() {
        let (cluster, _recorded) = recording(None);
        let (grid, _rx) = grid(&cluster);
        assert_eq!(grid.color(4), RowColor::default_for_row(4));

        let red = Labels::from([(labels::COLOR_LABEL.to_string(), "RED".to_string())]);
        grid.on_app_event(&AppEvent::new(4, 1, red, AppEventType::Added));
        assert_eq!(grid.color(4), RowColor::Red);

        let unknown = Labels::from([(labels::COLOR_LABEL.to_string(), "CHARTREUSE".to_string())]);
        grid.on_app_event(&AppEvent::new(4, 1, unknown, AppEventType::Added));
        assert_eq!(grid.color(4), RowColor::Red);

        assert_eq!(grid.color(12), RowColor::LightGreen);
    }

    #[tokio::test]
    async fn test_start_dispatches_without_waiting() {
        let gate = Arc::new(Notify::new());
        let (cluster, mut recorded) = recording(Some(gate.clone()));
        cluster.apps.lock()[4] = Some(0);
        let (grid, mut rx) = grid(&cluster);

        grid.start(4, 0).unwrap();

        // Returned while the scale request is still blocked.
        use NodeEventKind::*;
        assert_eq!(drain(&mut rx), vec![(4, 0, Starting)]);
        assert_eq!(columns(&grid, 4, Phase::Pending), vec![0]);
        assert_eq!(recorded.calls.recv().await, Some((4, 1)));
        assert_eq!(cluster.replicas(4), Some(0));

        gate.notify_one();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cluster.replicas(4), Some(1));
    }

    #[tokio::test]
    async fn test_start_live_node_is_noop() {
        let (cluster, mut recorded) = recording(None);
        cluster.apps.lock()[0] = Some(2);
        let (grid, mut rx) = grid(&cluster);
        grid.on_app_event(&event(0, 2, AppEventType::Added));
        drain(&mut rx);

        grid.start(0, 1).unwrap();
        assert!(drain(&mut rx).is_empty());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(recorded.calls.try_recv().is_err());

        assert!(matches!(grid.start(0, 8), Err(Error::IndexOutOfRange(8))));
    }

    #[tokio::test]
    async fn test_stop_requests_one_less() {
        let (cluster, mut recorded) = recording(None);
        cluster.apps.lock()[1] = Some(3);
        let (grid, mut rx) = grid(&cluster);
        grid.on_app_event(&event(1, 3, AppEventType::Added));
        drain(&mut rx);

        grid.stop(1, 0).unwrap();

        assert_eq!(drain(&mut rx), vec![(1, 0, NodeEventKind::Stopping)]);
        assert_eq!(recorded.calls.recv().await, Some((1, 2)));
        assert_eq!(grid.active(1), 2);
    }

    #[tokio::test]
    async fn test_scale_reconciles_locally() {
        let (cluster, mut recorded) = recording(None);
        cluster.apps.lock()[6] = Some(2);
        let (grid, mut rx) = grid(&cluster);
        grid.on_app_event(&event(6, 2, AppEventType::Added));
        drain(&mut rx);

        grid.scale(6, 4).unwrap();
        use NodeEventKind::*;
        assert_eq!(drain(&mut rx), vec![(6, 2, Starting), (6, 3, Starting)]);
        assert_eq!(recorded.calls.recv().await, Some((6, 4)));

        grid.scale(6, 1).unwrap();
        assert_eq!(
            drain(&mut rx),
            vec![(6, 3, Stopping), (6, 2, Stopping), (6, 1, Stopping)]
        );
        assert_eq!(recorded.calls.recv().await, Some((6, 1)));
        assert_eq!(grid.active(6), 1);
    }

    #[tokio::test]
    async fn test_scale_empty_row_makes_no_remote_call() {
        let (cluster, mut recorded) = recording(None);
        let (grid, mut rx) = grid(&cluster);

        assert!(matches!(
            cluster.scale(7, 2).await,
            Err(Error::EmptySlot(7))
        ));
        assert!(matches!(grid.scale(7, 2), Err(Error::EmptySlot(7))));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(recorded.calls.try_recv().is_err());
        assert!(drain(&mut rx).is_empty());
        assert_eq!(grid.active(7), 0);
        assert!(matches!(grid.scale(8, 1), Err(Error::IndexOutOfRange(8))));
    }

    #[tokio::test]
    async fn test_start_empty_row_is_rejected() {
        let (cluster, mut recorded) = recording(None);
        let (grid, mut rx) = grid(&cluster);

        assert!(matches!(grid.start(3, 0), Err(Error::EmptySlot(3))));
        assert!(drain(&mut rx).is_empty());
        assert!(!grid.get(3).unwrap()[0].active);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(recorded.calls.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_reset_dispatches() {
        let (cluster, mut recorded) = recording(None);
        let (grid, _rx) = grid(&cluster);
        grid.reset();
        assert_eq!(recorded.resets.recv().await, Some(()));
    }

    #[tokio::test]
    async fn test_reset_events_are_idempotent() {
        let (cluster, _recorded) = recording(None);
        let (grid, _rx) = grid(&cluster);
        grid.on_app_event(&event(0, 2, AppEventType::Added));
        grid.on_app_event(&event(3, 5, AppEventType::Added));

        let replay = |grid: &ClusterNodeGrid| {
            grid.on_app_event(&event(0, 0, AppEventType::Deleted));
            grid.on_app_event(&event(3, 0, AppEventType::Deleted));
            grid.on_app_event(&event(0, 2, AppEventType::Added));
            grid.on_app_event(&event(3, 5, AppEventType::Added));
            grid.snapshot()
        };

        let first = serde_json::to_value(replay(&grid)).unwrap();
        let second = serde_json::to_value(replay(&grid)).unwrap();
        assert_eq!(first, second);
        assert_eq!(grid.active(3), 5);
    }

    #[tokio::test]
    async fn test_queries() {
        let (cluster, _recorded) = recording(None);
        cluster.apps.lock()[1] = Some(1);
        cluster.apps.lock()[5] = Some(1);
        let (grid, _rx) = grid(&cluster);

        assert_eq!(grid.rows(), vec![1, 5]);
        assert!(grid.row_initialized(5));
        assert!(!grid.row_initialized(2));
        assert_eq!(grid.next(1).unwrap(), 0);
        assert!(matches!(grid.last(1), Err(Error::NoActiveNode(1))));
        assert!(grid.get(8).is_err());
        assert_eq!(grid.active(99), 0);

        let snapshot = grid.snapshot();
        assert!(snapshot.initialized);
        assert_eq!(snapshot.rows.len(), GRID_SIZE);
        assert!(snapshot.rows[5].deployed);
    }

    #[tokio::test]
    async fn test_event_loop_and_shutdown() {
        let (cluster, _recorded) = recording(None);
        let grid = Arc::new(ClusterNodeGrid::new(cluster.clone()));
        grid.initialize();
        let mut rx = grid.subscribe();

        let (tx, app_rx) = cloudpad_cluster::app_event_channel();
        let handle = grid.clone().spawn_event_loop(app_rx);
        tx.send(event(2, 2, AppEventType::Added)).unwrap();
        assert_eq!(rx.recv().await.unwrap().kind, NodeEventKind::Started);
        assert_eq!(rx.recv().await.unwrap().kind, NodeEventKind::Started);

        drop(tx);
        handle.await.unwrap();

        grid.shutdown();
        assert_eq!(grid.active(2), 0);
        assert!(drain(&mut rx).is_empty());
    }
}
