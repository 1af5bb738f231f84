//! Cloudpad Core: errors, configuration, label conventions.

pub mod config;
pub mod error;
pub mod labels;

pub use config::{
    read_token, BackendKind, CloudpadConfig, KubernetesSettings, MarathonSettings,
    OpenShiftSettings,
};
pub use error::{Error, Result};
pub use labels::Labels;

/// Number of rows (and columns) of the slot grid.
pub const GRID_SIZE: usize = 8;
