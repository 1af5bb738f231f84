//! Kubernetes adapter: Deployments in one namespace.

pub mod resource;

use std::time::Duration;

use async_trait::async_trait;
use cloudpad_core::{read_token, BackendKind, Error, KubernetesSettings, Result};
use reqwest::Client;
use tracing::info;

use crate::api::{WatchApi, WatchStream, WorkloadApi};
use crate::event::AppEventSender;
use crate::watched::WatchedCluster;
use crate::workload::Workload;

pub use resource::ResourceClient;

/// Adapter mirroring Kubernetes Deployments.
pub type KubernetesCluster = WatchedCluster<KubernetesClient>;

/// HTTP client for `apps/v1` Deployments.
#[derive(Clone)]
pub struct KubernetesClient {
    resource: ResourceClient,
}

impl KubernetesClient {
    pub fn new(settings: &KubernetesSettings) -> Result<Self> {
        let token = settings
            .token_file
            .as_deref()
            .map(read_token)
            .transpose()?;
        let client = Client::builder()
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        let path = format!(
            "/apis/apps/v1/namespaces/{}/deployments",
            settings.namespace
        );
        info!(
            "Kubernetes client for {} (namespace {})",
            settings.master, settings.namespace
        );
        Ok(Self {
            resource: ResourceClient::new(client, &settings.master, &path, token),
        })
    }

    pub fn resource(&self) -> &ResourceClient {
        &self.resource
    }
}

#[async_trait]
impl WorkloadApi for KubernetesClient {
    async fn list(&self) -> Result<Vec<Workload>> {
        self.resource.list().await
    }

    async fn scale(&self, workload: &Workload, replicas: u32) -> Result<Workload> {
        self.resource.scale(&workload.name, replicas).await
    }
}

#[async_trait]
impl WatchApi for KubernetesClient {
    async fn watch(&self) -> Result<WatchStream> {
        self.resource.watch().await
    }
}

impl KubernetesCluster {
    /// Build a Kubernetes adapter from settings.
    pub fn kubernetes(
        settings: &KubernetesSettings,
        events: AppEventSender,
        retry: Duration,
    ) -> Result<Self> {
        let client = KubernetesClient::new(settings)?;
        Ok(WatchedCluster::new(
            client,
            BackendKind::Kubernetes,
            events,
            retry,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_deployments_path() {
        let settings = KubernetesSettings {
            master: "https://k8s.local:6443".into(),
            namespace: "launchpad".into(),
            token_file: None,
        };
        let client = KubernetesClient::new(&settings).unwrap();
        assert_eq!(
            client.resource().collection_url(),
            "https://k8s.local:6443/apis/apps/v1/namespaces/launchpad/deployments"
        );
    }

    #[test]
    fn test_missing_token_file() {
        let settings = KubernetesSettings {
            token_file: Some(PathBuf::from("/nonexistent/token")),
            ..Default::default()
        };
        assert!(KubernetesClient::new(&settings).is_err());
    }

    #[tokio::test]
    async fn test_kind() {
        use crate::cluster::Cluster;
        let (tx, _rx) = crate::event::app_event_channel();
        let cluster = KubernetesCluster::kubernetes(
            &KubernetesSettings::default(),
            tx,
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(cluster.kind(), BackendKind::Kubernetes);
        assert_eq!(cluster.app_count(), 0);
    }
}
