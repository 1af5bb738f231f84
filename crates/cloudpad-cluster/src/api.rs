//! Backend client seams.
//!
//! Adapters talk to their remote API only through these traits, so the HTTP
//! clients can be swapped for in-memory backends in tests.

use std::pin::Pin;

use async_trait::async_trait;
use cloudpad_core::Result;
use futures::Stream;

use crate::workload::Workload;

/// Boxed stream of watch notifications.
pub type WatchStream = Pin<Box<dyn Stream<Item = Result<WatchEvent>> + Send>>;

/// A single notification from a watch subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Added(Workload),
    Modified(Workload),
    Deleted(Workload),
    Error(String),
}

/// Listing and scaling of remote workloads.
#[async_trait]
pub trait WorkloadApi: Send + Sync + 'static {
    /// List every workload currently known to the backend.
    async fn list(&self) -> Result<Vec<Workload>>;

    /// Set the desired replica count of `workload`. Returns the record as
    /// accepted by the backend.
    async fn scale(&self, workload: &Workload, replicas: u32) -> Result<Workload>;
}

/// Backends that can push changes.
#[async_trait]
pub trait WatchApi: WorkloadApi {
    /// Open a watch subscription. The stream ends when the server closes it.
    async fn watch(&self) -> Result<WatchStream>;
}
