//! Generic client for a namespaced, scalable resource collection on a
//! Kubernetes-style API server (Deployments, DeploymentConfigs).

use std::collections::BTreeMap;

use cloudpad_core::{Error, Result};
use futures::StreamExt;
use reqwest::{header, Client, Response};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::api::{WatchEvent, WatchStream};
use crate::workload::Workload;

// ---------------------------------------------------------------------------
// Object model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub labels: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub generation: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScaleSpec {
    #[serde(default)]
    pub replicas: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RolloutStatus {
    #[serde(default)]
    pub observed_generation: Option<i64>,
    #[serde(default)]
    pub replicas: Option<i64>,
    #[serde(default)]
    pub updated_replicas: Option<i64>,
    #[serde(default)]
    pub available_replicas: Option<i64>,
}

/// The subset of a Deployment / DeploymentConfig the grid cares about.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScalableObject {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ScaleSpec,
    #[serde(default)]
    pub status: Option<RolloutStatus>,
}

impl ScalableObject {
    pub fn desired_replicas(&self) -> u32 {
        clamp(self.spec.replicas.unwrap_or(0))
    }

    /// Whether the controller has not yet converged on the current spec.
    pub fn rollout_in_flight(&self) -> bool {
        let desired = self.desired_replicas() as i64;
        let status = match &self.status {
            Some(status) => status,
            None => return desired > 0,
        };

        if let (Some(observed), Some(generation)) =
            (status.observed_generation, self.metadata.generation)
        {
            if observed < generation {
                return true;
            }
        }

        [
            status.replicas,
            status.updated_replicas,
            status.available_replicas,
        ]
        .iter()
        .any(|count| count.unwrap_or(0) != desired)
    }

    pub fn into_workload(self) -> Workload {
        let deploying = self.rollout_in_flight();
        let replicas = self.desired_replicas();
        Workload {
            name: self.metadata.name,
            replicas,
            labels: self.metadata.labels.unwrap_or_default(),
            deploying,
        }
    }
}

fn clamp(replicas: i64) -> u32 {
    u32::try_from(replicas.max(0)).unwrap_or(u32::MAX)
}

#[derive(Debug, Deserialize)]
struct ObjectList {
    #[serde(default)]
    items: Vec<ScalableObject>,
}

#[derive(Debug, Deserialize)]
struct RawWatchEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    object: serde_json::Value,
}

/// Parse one line of a `?watch=true` response. Blank lines yield `None`.
pub fn parse_watch_line(line: &str) -> Result<Option<WatchEvent>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let raw: RawWatchEvent = serde_json::from_str(line)?;
    let event = match raw.kind.as_str() {
        "ERROR" => {
            let message = raw.object["message"]
                .as_str()
                .unwrap_or("unknown watch error")
                .to_string();
            WatchEvent::Error(message)
        }
        "ADDED" | "MODIFIED" | "DELETED" => {
            let workload = serde_json::from_value::<ScalableObject>(raw.object)?.into_workload();
            match raw.kind.as_str() {
                "ADDED" => WatchEvent::Added(workload),
                "MODIFIED" => WatchEvent::Modified(workload),
                _ => WatchEvent::Deleted(workload),
            }
        }
        other => {
            debug!("Ignoring watch event type {}", other);
            return Ok(None);
        }
    };
    Ok(Some(event))
}

fn parse_watch_bytes(line: &[u8]) -> Result<Option<WatchEvent>> {
    let line = std::str::from_utf8(line)
        .map_err(|e| Error::Backend(format!("Watch line is not UTF-8: {}", e)))?;
    parse_watch_line(line)
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// List, scale and watch one resource collection.
#[derive(Clone)]
pub struct ResourceClient {
    client: Client,
    collection_url: String,
    token: Option<String>,
}

impl ResourceClient {
    /// `base` is the API server URL, `path` the collection path starting with `/`.
    pub fn new(client: Client, base: &str, path: &str, token: Option<String>) -> Self {
        Self {
            client,
            collection_url: format!("{}{}", base.trim_end_matches('/'), path),
            token,
        }
    }

    pub fn collection_url(&self) -> &str {
        &self.collection_url
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    pub async fn list(&self) -> Result<Vec<Workload>> {
        let response = self
            .authorize(self.client.get(&self.collection_url))
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        let list: ObjectList = check(response)
            .await?
            .json()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(list
            .items
            .into_iter()
            .map(ScalableObject::into_workload)
            .collect())
    }

    /// Set `spec.replicas` with a merge patch.
    pub async fn scale(&self, name: &str, replicas: u32) -> Result<Workload> {
        let url = format!("{}/{}", self.collection_url, name);
        let body = serde_json::to_vec(&serde_json::json!({ "spec": { "replicas": replicas } }))?;

        let response = self
            .authorize(self.client.patch(&url))
            .header(header::CONTENT_TYPE, "application/merge-patch+json")
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        let object: ScalableObject = check(response)
            .await?
            .json()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(object.into_workload())
    }

    /// Open a watch on the collection. Notifications arrive as
    /// newline-delimited JSON.
    pub async fn watch(&self) -> Result<WatchStream> {
        let url = format!("{}?watch=true", self.collection_url);
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        let response = check(response).await?;

        let stream = async_stream::stream! {
            let mut bytes = response.bytes_stream();
            // Raw bytes: a chunk may end inside a multi-byte character.
            let mut buffer: Vec<u8> = Vec::new();

            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(Error::Http(format!("Watch read error: {}", e)));
                        return;
                    }
                };
                buffer.extend_from_slice(&chunk);

                while let Some(line_end) = buffer.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=line_end).collect();
                    match parse_watch_bytes(&line) {
                        Ok(Some(event)) => yield Ok(event),
                        Ok(None) => {}
                        Err(e) => warn!("Skipping malformed watch line: {}", e),
                    }
                }
            }

            if !buffer.is_empty() {
                debug!("Watch closed with {} bytes of unterminated data", buffer.len());
            }
        };
        Ok(Box::pin(stream))
    }
}

async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::Backend(format!("API error {}: {}", status, body)))
}
