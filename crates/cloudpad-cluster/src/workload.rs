//! Backend-neutral workload record.

use cloudpad_core::Labels;
use serde::Serialize;

/// One remote workload (Deployment, DeploymentConfig or Marathon app)
/// normalized to what the grid needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Workload {
    /// Backend identity (name or app id).
    pub name: String,
    /// Desired replica count.
    pub replicas: u32,
    pub labels: Labels,
    /// Whether a rollout is still in flight.
    pub deploying: bool,
}

impl Workload {
    pub fn new(name: impl Into<String>, replicas: u32) -> Self {
        Self {
            name: name.into(),
            replicas,
            labels: Labels::new(),
            deploying: false,
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_labels(mut self, labels: Labels) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_deploying(mut self, deploying: bool) -> Self {
        self.deploying = deploying;
        self
    }

    /// Shorthand for a workload carrying the enable label.
    pub fn enabled(name: impl Into<String>, replicas: u32) -> Self {
        Self::new(name, replicas).with_label(cloudpad_core::labels::ENABLE_LABEL, "true")
    }
}
