//! Marathon (DC/OS) adapter. Marathon has no watch API, so the mirror is
//! kept current by polling the app listing.

pub mod client;
pub mod cluster;

pub use client::{MarathonApp, MarathonClient};
pub use cluster::MarathonCluster;
