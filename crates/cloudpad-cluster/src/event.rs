//! App-level change notifications.

use cloudpad_core::Labels;
use serde::Serialize;
use tokio::sync::mpsc;

/// Kind of remote transition an adapter observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AppEventType {
    Added,
    Deleted,
    ScaledUp,
    ScaledDown,
    Deployed,
}

/// A change to the workload occupying row `index`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppEvent {
    pub index: usize,
    pub replicas: u32,
    pub labels: Labels,
    #[serde(rename = "type")]
    pub kind: AppEventType,
}

impl AppEvent {
    pub fn new(index: usize, replicas: u32, labels: Labels, kind: AppEventType) -> Self {
        Self {
            index,
            replicas,
            labels,
            kind,
        }
    }
}

pub type AppEventSender = mpsc::UnboundedSender<AppEvent>;
pub type AppEventReceiver = mpsc::UnboundedReceiver<AppEvent>;

/// Channel carrying app events from an adapter to the grid.
pub fn app_event_channel() -> (AppEventSender, AppEventReceiver) {
    mpsc::unbounded_channel()
}
