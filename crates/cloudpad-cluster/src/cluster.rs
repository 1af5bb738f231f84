//! The contract every cluster adapter exposes to the grid.

use async_trait::async_trait;
use cloudpad_core::{BackendKind, Labels, Result};

/// A cluster backend mirrored into eight rows.
///
/// Queries read the local mirror and never block on the network. `scale`
/// and `reset` talk to the backend; their effects reach the grid as
/// [`crate::AppEvent`]s on the channel the adapter was built with.
#[async_trait]
pub trait Cluster: Send + Sync {
    /// Which backend this adapter talks to.
    fn kind(&self) -> BackendKind;

    /// Load the initial listing and begin tracking changes in the
    /// background. Fails without starting anything if the listing fails.
    async fn start(&self) -> Result<()>;

    /// Stop tracking changes.
    fn shutdown(&self);

    /// Number of occupied rows.
    fn app_count(&self) -> usize;

    /// Whether row `index` holds a workload.
    fn app_exists(&self, index: usize) -> bool;

    /// Desired replicas of the workload at `index`.
    fn replicas(&self, index: usize) -> Option<u32>;

    /// Labels of the workload at `index` (empty when the row is free).
    fn labels(&self, index: usize) -> Labels;

    /// Request a new replica count for the workload at `index`.
    async fn scale(&self, index: usize, replicas: u32) -> Result<()>;

    /// Drop the mirror and rebuild it from a fresh listing.
    async fn reset(&self) -> Result<()>;

    /// Empty the mirror without telling anyone.
    fn clear(&self);
}
