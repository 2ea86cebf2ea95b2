//! Log retrieval for the stable and canary workloads.
//!
//! Also resolves a bare `rollouts-pod-template-hash` to the pod it labels, so
//! delegated analysis can name a concrete pod.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

/// Label the rollout controller stamps on every pod of a revision.
pub const TEMPLATE_HASH_LABEL: &str = "rollouts-pod-template-hash";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LogFetchError {
    /// No workload matched the selector.
    #[error("no pods found for selector {0}")]
    NotFound(String),
    #[error("failed to fetch logs: {0}")]
    Other(String),
}

impl LogFetchError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Returns the logs of the first pod matching a label selector.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LogFetcher: Send + Sync {
    async fn fetch_first_pod_logs(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<String, LogFetchError>;

    /// Name of the first pod labelled with `hash`.
    async fn resolve_pod_by_template_hash(
        &self,
        namespace: &str,
        hash: &str,
    ) -> Result<String, LogFetchError>;
}

/// Reads pre-collected logs from `{root}/{namespace}/{selector}.log`.
///
/// Pod listings live next to them in `{root}/{namespace}/{selector}.pods`,
/// one pod name per line.
#[derive(Debug, Clone)]
pub struct DirLogFetcher {
    root: PathBuf,
}

impl DirLogFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, namespace: &str, selector: &str) -> PathBuf {
        self.root.join(namespace).join(format!("{selector}.log"))
    }

    fn listing_for(&self, namespace: &str, selector: &str) -> PathBuf {
        self.root.join(namespace).join(format!("{selector}.pods"))
    }

    async fn read(path: &Path, selector: &str) -> Result<String, LogFetchError> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(LogFetchError::NotFound(selector.to_string()))
            }
            Err(e) => Err(LogFetchError::Other(format!("{}: {e}", path.display()))),
        }
    }
}

#[async_trait]
impl LogFetcher for DirLogFetcher {
    async fn fetch_first_pod_logs(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<String, LogFetchError> {
        let path = self.path_for(namespace, selector);
        debug!(path = %path.display(), "Reading pod logs");
        Self::read(&path, selector).await
    }

    async fn resolve_pod_by_template_hash(
        &self,
        namespace: &str,
        hash: &str,
    ) -> Result<String, LogFetchError> {
        let selector = format!("{TEMPLATE_HASH_LABEL}={hash}");
        let path = self.listing_for(namespace, &selector);
        debug!(path = %path.display(), "Reading pod listing");
        Self::read(&path, &selector)
            .await?
            .lines()
            .map(str::trim)
            .find(|name| !name.is_empty())
            .map(str::to_string)
            .ok_or(LogFetchError::NotFound(selector))
    }
}
