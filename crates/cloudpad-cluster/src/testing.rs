//! In-memory backend for tests.

use std::sync::Arc;

use async_trait::async_trait;
use cloudpad_core::{Error, Result};
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::api::{WatchApi, WatchEvent, WatchStream, WorkloadApi};
use crate::workload::Workload;

#[derive(Default)]
struct Inner {
    workloads: Vec<Workload>,
    watchers: Vec<mpsc::UnboundedSender<WatchEvent>>,
    scale_calls: Vec<(String, u32)>,
    fail_scale: bool,
    fail_list: bool,
    rollout_on_scale: bool,
}

/// A scriptable backend. Clones share state, so a test keeps one handle
/// while the adapter owns another.
#[derive(Clone, Default)]
pub struct FakeBackend {
    inner: Arc<Mutex<Inner>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a workload without notifying watchers.
    pub fn insert(&self, workload: Workload) {
        let mut inner = self.inner.lock();
        match inner.workloads.iter_mut().find(|w| w.name == workload.name) {
            Some(existing) => *existing = workload,
            None => inner.workloads.push(workload),
        }
    }

    /// Add or replace a workload and notify watchers.
    pub fn upsert(&self, workload: Workload) {
        let mut inner = self.inner.lock();
        let event = match inner.workloads.iter_mut().find(|w| w.name == workload.name) {
            Some(existing) => {
                *existing = workload.clone();
                WatchEvent::Modified(workload)
            }
            None => {
                inner.workloads.push(workload.clone());
                WatchEvent::Added(workload)
            }
        };
        broadcast(&mut inner, event);
    }

    /// Delete a workload and notify watchers.
    pub fn remove(&self, name: &str) {
        let mut inner = self.inner.lock();
        if let Some(pos) = inner.workloads.iter().position(|w| w.name == name) {
            let workload = inner.workloads.remove(pos);
            broadcast(&mut inner, WatchEvent::Deleted(workload));
        }
    }

    /// Push an error notification to watchers.
    pub fn send_error(&self, message: &str) {
        broadcast(&mut self.inner.lock(), WatchEvent::Error(message.to_string()));
    }

    /// End every open watch stream.
    pub fn close_watches(&self) {
        self.inner.lock().watchers.clear();
    }

    pub fn watcher_count(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.watchers.retain(|w| !w.is_closed());
        inner.watchers.len()
    }

    pub fn workload(&self, name: &str) -> Option<Workload> {
        self.inner
            .lock()
            .workloads
            .iter()
            .find(|w| w.name == name)
            .cloned()
    }

    /// `(name, replicas)` of every scale request received.
    pub fn scale_calls(&self) -> Vec<(String, u32)> {
        self.inner.lock().scale_calls.clone()
    }

    pub fn fail_scale(&self, fail: bool) {
        self.inner.lock().fail_scale = fail;
    }

    pub fn fail_list(&self, fail: bool) {
        self.inner.lock().fail_list = fail;
    }

    /// When set, scaled workloads report a rollout in flight until
    /// [`FakeBackend::finish_rollout`] is called.
    pub fn rollout_on_scale(&self, rollout: bool) {
        self.inner.lock().rollout_on_scale = rollout;
    }

    /// Complete the rollout of a workload and notify watchers.
    pub fn finish_rollout(&self, name: &str) {
        if let Some(workload) = self.workload(name) {
            self.upsert(workload.with_deploying(false));
        }
    }
}

fn broadcast(inner: &mut Inner, event: WatchEvent) {
    inner.watchers.retain(|tx| tx.send(event.clone()).is_ok());
}

#[async_trait]
impl WorkloadApi for FakeBackend {
    async fn list(&self) -> Result<Vec<Workload>> {
        let inner = self.inner.lock();
        if inner.fail_list {
            return Err(Error::Http("connection refused".into()));
        }
        Ok(inner.workloads.clone())
    }

    async fn scale(&self, workload: &Workload, replicas: u32) -> Result<Workload> {
        let mut inner = self.inner.lock();
        inner.scale_calls.push((workload.name.clone(), replicas));
        if inner.fail_scale {
            return Err(Error::Backend("scale rejected".into()));
        }

        let deploying = inner.rollout_on_scale;
        let updated = match inner.workloads.iter_mut().find(|w| w.name == workload.name) {
            Some(existing) => {
                existing.replicas = replicas;
                existing.deploying = deploying;
                existing.clone()
            }
            None => return Err(Error::Backend(format!("{} not found", workload.name))),
        };
        broadcast(&mut inner, WatchEvent::Modified(updated.clone()));
        Ok(updated)
    }
}

#[async_trait]
impl WatchApi for FakeBackend {
    async fn watch(&self) -> Result<WatchStream> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.lock().watchers.push(tx);
        Ok(UnboundedReceiverStream::new(rx).map(Ok::<_, Error>).boxed())
    }
}
