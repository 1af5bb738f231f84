//! OpenShift adapter: DeploymentConfigs in one project.

use std::time::Duration;

use async_trait::async_trait;
use cloudpad_core::{read_token, BackendKind, Error, OpenShiftSettings, Result};
use reqwest::Client;
use tracing::info;

use crate::api::{WatchApi, WatchStream, WorkloadApi};
use crate::event::AppEventSender;
use crate::kubernetes::ResourceClient;
use crate::watched::WatchedCluster;
use crate::workload::Workload;

pub type OpenShiftCluster = WatchedCluster<OpenShiftClient>;

/// HTTP client for `apps.openshift.io/v1` DeploymentConfigs.
#[derive(Clone)]
pub struct OpenShiftClient {
    resource: ResourceClient,
}

impl OpenShiftClient {
    pub fn new(settings: &OpenShiftSettings) -> Result<Self> {
        let token = settings
            .token_file
            .as_deref()
            .map(read_token)
            .transpose()?;
        let client = Client::builder()
            .danger_accept_invalid_certs(settings.trust_certs)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        let path = format!(
            "/apis/apps.openshift.io/v1/namespaces/{}/deploymentconfigs",
            settings.project
        );
        info!(
            "OpenShift client for {} (project {})",
            settings.url, settings.project
        );
        Ok(Self {
            resource: ResourceClient::new(client, &settings.url, &path, token),
        })
    }

    pub fn resource(&self) -> &ResourceClient {
        &self.resource
    }
}

#[async_trait]
impl WorkloadApi for OpenShiftClient {
    async fn list(&self) -> Result<Vec<Workload>> {
        self.resource.list().await
    }

    async fn scale(&self, workload: &Workload, replicas: u32) -> Result<Workload> {
        self.resource.scale(&workload.name, replicas).await
    }
}

#[async_trait]
impl WatchApi for OpenShiftClient {
    async fn watch(&self) -> Result<WatchStream> {
        self.resource.watch().await
    }
}

impl OpenShiftCluster {
    pub fn openshift(
        settings: &OpenShiftSettings,
        events: AppEventSender,
        retry: Duration,
    ) -> Result<Self> {
        let client = OpenShiftClient::new(settings)?;
        Ok(WatchedCluster::new(
            client,
            BackendKind::OpenShift,
            events,
            retry,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deploymentconfigs_path() {
        let settings = OpenShiftSettings {
            url: "https://master.example:8443/".into(),
            project: "demo".into(),
            ..Default::default()
        };
        let client = OpenShiftClient::new(&settings).unwrap();
        assert_eq!(
            client.resource().collection_url(),
            "https://master.example:8443/apis/apps.openshift.io/v1/namespaces/demo/deploymentconfigs"
        );
    }
}
