//! REST client for the Marathon `v2/apps` API.

use std::collections::BTreeMap;

use async_trait::async_trait;
use cloudpad_core::{labels, read_token, Error, MarathonSettings, Result};
use reqwest::{header, Client, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::WorkloadApi;
use crate::workload::Workload;

#[derive(Debug, Clone, Deserialize)]
pub struct MarathonApp {
    pub id: String,
    #[serde(default)]
    pub instances: i64,
    /// Deployments currently affecting the app.
    #[serde(default)]
    pub deployments: Vec<serde_json::Value>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl MarathonApp {
    pub fn into_workload(self) -> Workload {
        Workload {
            deploying: !self.deployments.is_empty(),
            replicas: u32::try_from(self.instances.max(0)).unwrap_or(u32::MAX),
            name: self.id,
            labels: self.labels,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AppList {
    #[serde(default)]
    apps: Vec<MarathonApp>,
}

#[derive(Debug, Serialize)]
struct ScalingUpdate {
    instances: u32,
}

/// Marathon HTTP client. The access token, when configured, is sent as
/// `Authorization: token=<value>`.
#[derive(Clone)]
pub struct MarathonClient {
    client: Client,
    endpoint: String,
    token: Option<String>,
}

impl MarathonClient {
    pub fn new(settings: &MarathonSettings) -> Result<Self> {
        let token = settings
            .access_token_file
            .as_deref()
            .map(read_token)
            .transpose()?;
        let client = Client::builder()
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self::with_client(client, &settings.api_endpoint, token))
    }

    pub fn with_client(client: Client, endpoint: &str, token: Option<String>) -> Self {
        let mut endpoint = endpoint.to_string();
        if !endpoint.ends_with('/') {
            endpoint.push('/');
        }
        Self {
            client,
            endpoint,
            token,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn list_url(&self) -> String {
        format!("{}v2/apps?label={}==true", self.endpoint, labels::ENABLE_LABEL)
    }

    pub fn app_url(&self, id: &str) -> String {
        format!("{}v2/apps/{}?force=true", self.endpoint, id.trim_start_matches('/'))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.header(header::AUTHORIZATION, format!("token={}", token)),
            None => request,
        }
    }

    pub async fn list_apps(&self) -> Result<Vec<MarathonApp>> {
        let response = self
            .authorize(self.client.get(self.list_url()))
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        let list: AppList = check(response)
            .await?
            .json()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(list.apps)
    }

    /// Set the instance count of an app, forcing past running deployments.
    pub async fn update_instances(&self, id: &str, instances: u32) -> Result<()> {
        let response = self
            .authorize(self.client.put(self.app_url(id)))
            .json(&ScalingUpdate { instances })
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        check(response).await?;
        debug!("Marathon accepted {} instances for {}", instances, id);
        Ok(())
    }
}

async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::Backend(format!("Marathon error {}: {}", status, body)))
}

#[async_trait]
impl WorkloadApi for MarathonClient {
    async fn list(&self) -> Result<Vec<Workload>> {
        Ok(self
            .list_apps()
            .await?
            .into_iter()
            .map(MarathonApp::into_workload)
            .collect())
    }

    /// Marathon answers a scale with a deployment id only; the app is
    /// reported as deploying until the next poll sees it settle.
    async fn scale(&self, workload: &Workload, replicas: u32) -> Result<Workload> {
        self.update_instances(&workload.name, replicas).await?;
        Ok(Workload {
            replicas,
            deploying: true,
            ..workload.clone()
        })
    }
}
