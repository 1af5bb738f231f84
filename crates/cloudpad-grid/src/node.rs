//! Per-slot node state.

use serde::Serialize;

/// Lifecycle phase of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Pending,
    Running,
    Terminated,
    Succeeded,
    Failed,
    Unknown,
}

/// One cell of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClusterNode {
    pub row: usize,
    pub column: usize,
    pub phase: Phase,
    pub active: bool,
}

impl ClusterNode {
    pub fn new(row: usize, column: usize) -> Self {
        Self {
            row,
            column,
            phase: Phase::Unknown,
            active: false,
        }
    }

    pub fn activate(&mut self) -> &mut Self {
        self.active = true;
        self.phase = Phase::Running;
        self
    }

    /// Change the phase. Inactive nodes keep theirs.
    pub fn update(&mut self, phase: Phase) {
        if self.active {
            self.phase = phase;
        }
    }

    pub fn deactivate(&mut self) -> &mut Self {
        self.active = false;
        self.phase = Phase::Terminated;
        self
    }

    /// Active and not on its way out. Only live nodes count as replicas.
    pub fn is_live(&self) -> bool {
        self.active && self.phase != Phase::Succeeded
    }
}
