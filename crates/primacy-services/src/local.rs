//! Host-local clients for [`ManagedServices`](crate::ManagedServices).
//!
//! Metrics and messages become structured log events; objects live under
//! a root directory, with `scheme://bucket/key` mapped to `root/bucket/key`.

use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use tracing::{debug, info};

use primacy_core::Credential;

use crate::client_cache::ClientFactory;
use crate::metrics::MetricDatum;
use crate::services::{
    ManagedClients, MessagePublisher, MetricClient, ObjectReader, ObjectStore,
};

/// Logs each datum at info level.
#[derive(Debug, Default)]
pub struct LogMetricClient;

#[async_trait]
impl MetricClient for LogMetricClient {
    async fn put_metric_data(
        &self,
        namespace: &str,
        data: &[MetricDatum],
    ) -> anyhow::Result<String> {
        for datum in data {
            info!(%namespace, %datum, "metric");
        }
        Ok(format!("accepted {} datums", data.len()))
    }
}

/// Logs each message and numbers them per process.
#[derive(Debug, Default)]
pub struct LogPublisher {
    next_id: AtomicU64,
}

#[async_trait]
impl MessagePublisher for LogPublisher {
    async fn publish(&self, topic: &str, message: &str) -> anyhow::Result<Option<String>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let message_id = format!("{topic}-{id}");
        info!(%topic, %message_id, %message, "message");
        Ok(Some(message_id))
    }
}

/// Objects stored as files under `root`.
#[derive(Debug, Clone)]
pub struct DirectoryObjectStore {
    root: PathBuf,
}

impl DirectoryObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Local path for `url`. Rejects empty keys and `..` segments.
    pub fn resolve(&self, url: &str) -> anyhow::Result<PathBuf> {
        let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
        let relative = Path::new(rest.trim_start_matches('/'));
        let normal = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if relative.as_os_str().is_empty() || !normal {
            anyhow::bail!("invalid object url: {url}");
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for DirectoryObjectStore {
    async fn get(&self, url: &str) -> anyhow::Result<ObjectReader> {
        let path = self.resolve(url)?;
        let file = tokio::fs::File::open(&path)
            .await
            .with_context(|| format!("opening {}", path.display()))?;
        Ok(Box::new(file))
    }

    async fn put(&self, url: &str, file: &Path) -> anyhow::Result<()> {
        let path = self.resolve(url)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let bytes = tokio::fs::copy(file, &path)
            .await
            .with_context(|| format!("copying {} to {}", file.display(), path.display()))?;
        debug!(%url, path = %path.display(), bytes, "object stored");
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct LogMetricFactory;

#[async_trait]
impl ClientFactory for LogMetricFactory {
    type Client = dyn MetricClient;

    async fn build(&self, credential: &Credential) -> anyhow::Result<Arc<dyn MetricClient>> {
        debug!(%credential, "local metric client");
        Ok(Arc::new(LogMetricClient))
    }
}

#[derive(Debug, Default)]
pub struct LogPublisherFactory;

#[async_trait]
impl ClientFactory for LogPublisherFactory {
    type Client = dyn MessagePublisher;

    async fn build(&self, credential: &Credential) -> anyhow::Result<Arc<dyn MessagePublisher>> {
        debug!(%credential, "local message publisher");
        Ok(Arc::new(LogPublisher::default()))
    }
}

/// Every credential shares the same root directory.
#[derive(Debug, Clone)]
pub struct DirectoryStoreFactory {
    root: PathBuf,
}

impl DirectoryStoreFactory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ClientFactory for DirectoryStoreFactory {
    type Client = dyn ObjectStore;

    async fn build(&self, credential: &Credential) -> anyhow::Result<Arc<dyn ObjectStore>> {
        debug!(%credential, root = %self.root.display(), "local object store");
        Ok(Arc::new(DirectoryObjectStore::new(self.root.clone())))
    }
}

/// Local client factories, with objects under `object_root`.
pub fn local_clients(object_root: impl Into<PathBuf>) -> ManagedClients {
    ManagedClients {
        metrics: Arc::new(LogMetricFactory),
        publishers: Arc::new(LogPublisherFactory),
        object_stores: Arc::new(DirectoryStoreFactory::new(object_root)),
    }
}
