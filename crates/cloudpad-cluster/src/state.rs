//! Shared adapter state: the slot mirror plus the backend client.

use cloudpad_core::{Error, Labels, Result, GRID_SIZE};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::api::{WatchEvent, WorkloadApi};
use crate::event::{AppEvent, AppEventSender};
use crate::slots::SlotTable;
use crate::workload::Workload;

pub(crate) struct ClusterState<A> {
    pub(crate) api: A,
    slots: Mutex<SlotTable>,
    events: AppEventSender,
    /// Serializes remote mutations against mirror updates from the
    /// watch/poll task.
    client_lock: tokio::sync::Mutex<()>,
}

impl<A: WorkloadApi> ClusterState<A> {
    pub(crate) fn new(api: A, events: AppEventSender) -> Self {
        Self {
            api,
            slots: Mutex::new(SlotTable::new()),
            events,
            client_lock: tokio::sync::Mutex::new(()),
        }
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    pub(crate) fn app_count(&self) -> usize {
        self.slots.lock().len()
    }

    pub(crate) fn app_exists(&self, index: usize) -> bool {
        self.slots.lock().is_occupied(index)
    }

    pub(crate) fn replicas(&self, index: usize) -> Option<u32> {
        self.slots.lock().get(index).map(|w| w.replicas)
    }

    pub(crate) fn labels(&self, index: usize) -> Labels {
        self.slots
            .lock()
            .get(index)
            .map(|w| w.labels.clone())
            .unwrap_or_default()
    }

    pub(crate) fn clear(&self) {
        let removed = self.slots.lock().clear();
        info!("Cleared {} workloads from the mirror", removed.len());
    }

    // ---------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------

    /// Request `replicas` for the workload at `index`. The mirror is only
    /// touched once the backend accepts.
    pub(crate) async fn scale(&self, index: usize, replicas: u32) -> Result<()> {
        if index >= GRID_SIZE {
            return Err(Error::IndexOutOfRange(index));
        }

        let _guard = self.client_lock.lock().await;
        let current = self.slots.lock().get(index).cloned();
        let workload = match current {
            Some(w) => w,
            None => {
                warn!("Could not scale: no app deployed at index {}", index);
                return Err(Error::EmptySlot(index));
            }
        };

        info!(
            "Scaling workload {} at index {} to {} replicas",
            workload.name, index, replicas
        );

        let accepted = match self.api.scale(&workload, replicas).await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("Failed to scale workload {}: {}", workload.name, e);
                return Err(e);
            }
        };

        let event = self.slots.lock().acknowledge_scale(index, accepted);
        if let Some(event) = event {
            self.publish(event);
        }
        Ok(())
    }

    /// Rebuild the mirror from a fresh listing. A failed listing leaves the
    /// mirror as it was.
    pub(crate) async fn reset(&self) -> Result<()> {
        let _guard = self.client_lock.lock().await;
        let listing = self.api.list().await.map_err(|e| {
            error!("Reset failed to list workloads: {}", e);
            e
        })?;

        let events = self.slots.lock().reload(listing);
        info!("Reset mirror, {} events", events.len());
        self.publish_all(events);
        Ok(())
    }

    /// Initial load: admit every listed workload.
    pub(crate) async fn load(&self) -> Result<()> {
        let _guard = self.client_lock.lock().await;
        let listing = self.api.list().await?;
        let events = self.admit_all(listing);
        info!("Loaded {} workloads", self.app_count());
        self.publish_all(events);
        Ok(())
    }

    /// Fold a full listing into the mirror (polling backends).
    pub(crate) async fn poll(&self) -> Result<()> {
        let _guard = self.client_lock.lock().await;
        let snapshot = self.api.list().await?;
        let events = self.slots.lock().reconcile(snapshot);
        self.publish_all(events);
        Ok(())
    }

    /// Fold one watch notification into the mirror.
    pub(crate) async fn apply_watch_event(&self, event: WatchEvent) {
        let _guard = self.client_lock.lock().await;
        let events: Vec<AppEvent> = match event {
            WatchEvent::Added(w) | WatchEvent::Modified(w) => self.slots.lock().apply(w),
            WatchEvent::Deleted(w) => self.slots.lock().remove(&w.name).into_iter().collect(),
            WatchEvent::Error(message) => {
                warn!("Watch reported an error: {}", message);
                Vec::new()
            }
        };
        self.publish_all(events);
    }

    fn admit_all(&self, listing: Vec<Workload>) -> Vec<AppEvent> {
        let mut slots = self.slots.lock();
        listing
            .into_iter()
            .filter_map(|w| slots.admit(w).ok())
            .collect()
    }

    fn publish_all(&self, events: Vec<AppEvent>) {
        for event in events {
            self.publish(event);
        }
    }

    fn publish(&self, event: AppEvent) {
        debug!("App event {:?} at index {}", event.kind, event.index);
        if self.events.send(event).is_err() {
            debug!("No app event receiver, event dropped");
        }
    }
}
