//! Configuration and backend selection.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};

pub const DEFAULT_PORT: u16 = 3004;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2500;
pub const DEFAULT_WATCH_RETRY_MS: u64 = 5000;

/// Which cluster API the grid is driven by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Kubernetes,
    OpenShift,
    Marathon,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Kubernetes => write!(f, "kubernetes"),
            Self::OpenShift => write!(f, "openshift"),
            Self::Marathon => write!(f, "marathon"),
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kubernetes" | "k8s" => Ok(Self::Kubernetes),
            "openshift" => Ok(Self::OpenShift),
            "marathon" | "dcos" => Ok(Self::Marathon),
            other => Err(Error::Config(format!("Unknown cluster service: {}", other))),
        }
    }
}

/// Kubernetes API server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KubernetesSettings {
    #[serde(default = "default_kubernetes_master")]
    pub master: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default)]
    pub token_file: Option<PathBuf>,
}

/// OpenShift master settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenShiftSettings {
    #[serde(default = "default_openshift_url")]
    pub url: String,
    #[serde(default = "default_namespace")]
    pub project: String,
    #[serde(default)]
    pub token_file: Option<PathBuf>,
    /// Accept self-signed master certificates.
    #[serde(default = "default_trust_certs")]
    pub trust_certs: bool,
}

/// Marathon (DC/OS) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarathonSettings {
    #[serde(default = "default_marathon_endpoint")]
    pub api_endpoint: String,
    #[serde(default)]
    pub access_token_file: Option<PathBuf>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

fn default_kubernetes_master() -> String {
    "http://localhost:8001".into()
}
fn default_openshift_url() -> String {
    "https://localhost:8443".into()
}
fn default_marathon_endpoint() -> String {
    "http://localhost:8080/".into()
}
fn default_namespace() -> String {
    "default".into()
}
fn default_trust_certs() -> bool {
    true
}
fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}
fn default_watch_retry() -> u64 {
    DEFAULT_WATCH_RETRY_MS
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_service() -> BackendKind {
    BackendKind::Kubernetes
}

impl Default for KubernetesSettings {
    fn default() -> Self {
        Self {
            master: default_kubernetes_master(),
            namespace: default_namespace(),
            token_file: None,
        }
    }
}

impl Default for OpenShiftSettings {
    fn default() -> Self {
        Self {
            url: default_openshift_url(),
            project: default_namespace(),
            token_file: None,
            trust_certs: true,
        }
    }
}

impl Default for MarathonSettings {
    fn default() -> Self {
        Self {
            api_endpoint: default_marathon_endpoint(),
            access_token_file: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

/// Top-level Cloudpad configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudpadConfig {
    /// HTTP control surface port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Active backend.
    #[serde(default = "default_service")]
    pub service: BackendKind,
    /// Delay before re-subscribing a dropped watch.
    #[serde(default = "default_watch_retry")]
    pub watch_retry_ms: u64,
    #[serde(default)]
    pub kubernetes: KubernetesSettings,
    #[serde(default)]
    pub openshift: OpenShiftSettings,
    #[serde(default)]
    pub marathon: MarathonSettings,
}

impl Default for CloudpadConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            service: BackendKind::Kubernetes,
            watch_retry_ms: DEFAULT_WATCH_RETRY_MS,
            kubernetes: KubernetesSettings::default(),
            openshift: OpenShiftSettings::default(),
            marathon: MarathonSettings::default(),
        }
    }
}

impl CloudpadConfig {
    /// Load config from a JSON file (defaults if missing), then apply
    /// environment overrides.
    pub fn load(config_path: &Path) -> Result<Self> {
        Self::load_with(config_path, |key| std::env::var(key).ok())
    }

    /// Like [`CloudpadConfig::load`] with an explicit variable lookup.
    pub fn load_with<F>(config_path: &Path, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match std::fs::read_to_string(config_path) {
            Ok(data) => serde_json::from_str(&data)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => return Err(e.into()),
        };
        config.apply_env(lookup)?;

        info!(
            "Loaded configuration: service={}, port={}",
            config.service, config.port
        );
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// production).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(service) = lookup("CLUSTER_SERVICE") {
            self.service = service.parse()?;
        }
        if let Some(port) = lookup("PORT") {
            self.port = port
                .parse()
                .map_err(|_| Error::Config(format!("Invalid PORT: {}", port)))?;
        }
        if let Some(retry) = lookup("WATCH_RETRY_MS") {
            self.watch_retry_ms = parse_millis("WATCH_RETRY_MS", &retry)?;
        }

        if let Some(master) = lookup("KUBERNETES_MASTER") {
            self.kubernetes.master = master;
        }
        if let Some(namespace) = lookup("KUBERNETES_NAMESPACE") {
            self.kubernetes.namespace = namespace;
        }
        if let Some(file) = lookup("KUBERNETES_TOKEN_FILE") {
            self.kubernetes.token_file = Some(PathBuf::from(file));
        }

        if let Some(url) = lookup("OPENSHIFT_URL") {
            self.openshift.url = url;
        }
        if let Some(project) = lookup("OPENSHIFT_PROJECT") {
            self.openshift.project = project;
        }
        if let Some(file) = lookup("OPENSHIFT_TOKEN_FILE") {
            self.openshift.token_file = Some(PathBuf::from(file));
        }
        if let Some(trust) = lookup("OPENSHIFT_TRUST_CERTS") {
            self.openshift.trust_certs = trust.trim().eq_ignore_ascii_case("true");
        }

        if let Some(endpoint) = lookup("MARATHON_API_ENDPOINT") {
            self.marathon.api_endpoint = endpoint;
        }
        if let Some(file) = lookup("MARATHON_ACCESS_TOKEN_FILE") {
            self.marathon.access_token_file = Some(PathBuf::from(file));
        }
        if let Some(interval) = lookup("MARATHON_POLL_INTERVAL_MS") {
            self.marathon.poll_interval_ms = parse_millis("MARATHON_POLL_INTERVAL_MS", &interval)?;
        }

        Ok(())
    }
}

fn parse_millis(key: &str, value: &str) -> Result<u64> {
    match value.trim().parse::<u64>() {
        Ok(0) | Err(_) => Err(Error::Config(format!("Invalid {}: {}", key, value))),
        Ok(ms) => Ok(ms),
    }
}

/// Read an access token from disk, trimming the trailing newline.
pub fn read_token(path: &Path) -> Result<String> {
    let token = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Cannot read token file {}: {}", path.display(), e))
    })?;
    Ok(token.trim().to_string())
}
