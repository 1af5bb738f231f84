//! Cluster backends behind one contract.
//!
//! Each adapter mirrors up to eight enabled workloads of its backend into a
//! fixed slot table, keeps the mirror current (watch stream or polling) and
//! reports every change as an [`AppEvent`].

pub mod api;
pub mod cluster;
pub mod event;
pub mod kubernetes;
pub mod marathon;
pub mod openshift;
pub mod slots;
pub mod watched;
pub mod workload;

mod state;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

#[cfg(test)]
mod http_recorder;

pub use api::{WatchApi, WatchEvent, WatchStream, WorkloadApi};
pub use cluster::Cluster;
pub use event::{app_event_channel, AppEvent, AppEventReceiver, AppEventSender, AppEventType};
pub use kubernetes::{KubernetesClient, KubernetesCluster};
pub use marathon::{MarathonClient, MarathonCluster};
pub use openshift::{OpenShiftClient, OpenShiftCluster};
pub use slots::{Rejection, SlotTable};
pub use watched::WatchedCluster;
pub use workload::Workload;
