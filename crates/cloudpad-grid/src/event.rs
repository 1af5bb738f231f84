//! Node-level lifecycle notifications.

use serde::Serialize;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeEventKind {
    Starting,
    Started,
    Stopping,
    Stopped,
}

/// A transition of the node at `(row, column)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NodeEvent {
    pub row: usize,
    pub column: usize,
    pub kind: NodeEventKind,
}

impl NodeEvent {
    pub fn new(row: usize, column: usize, kind: NodeEventKind) -> Self {
        Self { row, column, kind }
    }
}

impl std::fmt::Display for NodeEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} ({}, {})", self.kind, self.row, self.column)
    }
}

pub type NodeEventSender = mpsc::UnboundedSender<NodeEvent>;
pub type NodeEventReceiver = mpsc::UnboundedReceiver<NodeEvent>;
