//! Fixed slot table: admission, placement and change detection.
//!
//! The table is the adapter-side mirror of the remote workloads. Every
//! mutation returns the [`AppEvent`]s it implies, in the order they must be
//! delivered.

use cloudpad_core::{labels, GRID_SIZE};
use tracing::{debug, info, warn};

use crate::event::{AppEvent, AppEventType};
use crate::workload::Workload;

/// Why a workload was not placed on the grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// The enable label is missing or not `true`.
    Disabled,
    /// A workload with the same name already occupies `index`.
    Duplicate { index: usize },
    /// The row hint is not an integer.
    InvalidRowHint(String),
    /// All rows are occupied.
    Full,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disabled => write!(f, "not enabled for the grid"),
            Self::Duplicate { index } => write!(f, "already added at index {}", index),
            Self::InvalidRowHint(value) => write!(f, "invalid row hint '{}'", value),
            Self::Full => write!(f, "all rows are occupied"),
        }
    }
}

/// Eight slots, each empty or holding one workload.
#[derive(Debug, Clone, Default)]
pub struct SlotTable {
    slots: [Option<Workload>; GRID_SIZE],
}

impl SlotTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, index: usize) -> Option<&Workload> {
        self.slots.get(index).and_then(|s| s.as_ref())
    }

    pub fn is_occupied(&self, index: usize) -> bool {
        self.get(index).is_some()
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row of the workload with the given name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.as_ref().map_or(false, |w| w.name == name))
    }

    // ---------------------------------------------------------------
    // Admission
    // ---------------------------------------------------------------

    /// Place a newly observed workload. On success returns the `Added` event.
    pub fn admit(&mut self, workload: Workload) -> Result<AppEvent, Rejection> {
        if let Some(index) = self.index_of(&workload.name) {
            info!("Workload {} already added. Ignored.", workload.name);
            return Err(Rejection::Duplicate { index });
        }

        if !labels::is_enabled(&workload.labels) {
            debug!("Workload {} is not enabled for the grid", workload.name);
            return Err(Rejection::Disabled);
        }

        let hint = match labels::row_hint(&workload.labels) {
            Ok(hint) => hint,
            Err(_) => {
                let value = workload
                    .labels
                    .get(labels::ROW_LABEL)
                    .cloned()
                    .unwrap_or_default();
                warn!("Workload {} has invalid row hint '{}'", workload.name, value);
                return Err(Rejection::InvalidRowHint(value));
            }
        };

        let preferred = hint
            .and_then(|row| usize::try_from(row).ok())
            .filter(|&row| row < GRID_SIZE && self.slots[row].is_none());

        let index = match preferred.or_else(|| self.slots.iter().position(|s| s.is_none())) {
            Some(index) => index,
            None => {
                warn!(
                    "Found new workload {} but could not add because all rows are occupied.",
                    workload.name
                );
                return Err(Rejection::Full);
            }
        };

        info!("Added workload {} at index {}.", workload.name, index);
        let event = AppEvent::new(
            index,
            workload.replicas,
            workload.labels.clone(),
            AppEventType::Added,
        );
        self.slots[index] = Some(workload);
        Ok(event)
    }

    // ---------------------------------------------------------------
    // Change detection
    // ---------------------------------------------------------------

    /// Apply a fresh observation of a workload. Known workloads are diffed
    /// against the mirror; unknown ones go through admission.
    pub fn apply(&mut self, workload: Workload) -> Vec<AppEvent> {
        match self.index_of(&workload.name) {
            Some(index) => self.replace(index, workload),
            None => self.admit(workload).into_iter().collect(),
        }
    }

    /// Drop a workload that disappeared remotely.
    pub fn remove(&mut self, name: &str) -> Option<AppEvent> {
        let index = self.index_of(name)?;
        let workload = self.slots[index].take()?;
        info!("Deleted workload {} from index {}.", name, index);
        Some(AppEvent::new(
            index,
            0,
            workload.labels,
            AppEventType::Deleted,
        ))
    }

    /// Diff a complete listing against the mirror: updates and removals
    /// first (in row order), then admissions of new workloads.
    pub fn reconcile(&mut self, snapshot: Vec<Workload>) -> Vec<AppEvent> {
        let mut remaining = snapshot;
        let mut events = Vec::new();

        for index in 0..GRID_SIZE {
            let name = match &self.slots[index] {
                Some(w) => w.name.clone(),
                None => continue,
            };

            match remaining.iter().position(|w| w.name == name) {
                Some(pos) => {
                    let workload = remaining.remove(pos);
                    events.extend(self.replace(index, workload));
                }
                None => events.extend(self.remove(&name)),
            }
        }

        for workload in remaining {
            if let Ok(event) = self.admit(workload) {
                events.push(event);
            }
        }

        events
    }

    /// Record the backend's answer to a scale request for the workload at
    /// `index`. Emits `Deployed` at once when no rollout is in flight.
    pub fn acknowledge_scale(&mut self, index: usize, accepted: Workload) -> Option<AppEvent> {
        let slot = self.slots.get_mut(index)?;
        match slot {
            Some(current) if current.name == accepted.name => {
                let deploying = accepted.deploying;
                let replicas = accepted.replicas;
                let labels = accepted.labels.clone();
                *current = accepted;
                (!deploying).then(|| AppEvent::new(index, replicas, labels, AppEventType::Deployed))
            }
            _ => {
                debug!(
                    "Workload {} left index {} while scaling",
                    accepted.name, index
                );
                None
            }
        }
    }

    /// Empty every slot, returning the workloads that were held.
    pub fn clear(&mut self) -> Vec<(usize, Workload)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, s)| s.take().map(|w| (i, w)))
            .collect()
    }

    /// Replace the whole mirror with a fresh listing: `Deleted` for every
    /// previously occupied row, then `Added` for every admitted workload.
    pub fn reload(&mut self, listing: Vec<Workload>) -> Vec<AppEvent> {
        let mut events: Vec<AppEvent> = self
            .clear()
            .into_iter()
            .map(|(index, w)| AppEvent::new(index, 0, w.labels, AppEventType::Deleted))
            .collect();

        for workload in listing {
            if let Ok(event) = self.admit(workload) {
                events.push(event);
            }
        }
        events
    }

    fn replace(&mut self, index: usize, workload: Workload) -> Vec<AppEvent> {
        let previous = match self.slots[index].replace(workload) {
            Some(previous) => previous,
            None => return Vec::new(),
        };
        let current = match &self.slots[index] {
            Some(current) => current,
            None => return Vec::new(),
        };
        transitions(index, &previous, current)
    }
}

/// Events implied by a workload changing from `old` to `new`: the scale
/// transition first, rollout completion second.
fn transitions(index: usize, old: &Workload, new: &Workload) -> Vec<AppEvent> {
    let mut events = Vec::new();

    if old.replicas < new.replicas {
        info!(
            "Scaled up workload {} from {} to {} replicas",
            new.name, old.replicas, new.replicas
        );
        events.push(AppEvent::new(
            index,
            new.replicas,
            new.labels.clone(),
            AppEventType::ScaledUp,
        ));
    } else if old.replicas > new.replicas {
        info!(
            "Scaled down workload {} from {} to {} replicas",
            new.name, old.replicas, new.replicas
        );
        events.push(AppEvent::new(
            index,
            new.replicas,
            new.labels.clone(),
            AppEventType::ScaledDown,
        ));
    }

    if old.deploying && !new.deploying {
        debug!("Rollout of workload {} finished", new.name);
        events.push(AppEvent::new(
            index,
            new.replicas,
            new.labels.clone(),
            AppEventType::Deployed,
        ));
    }

    events
}
