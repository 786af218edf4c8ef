//! Blob-store collaborator: resolves the blob keys carried by an execute
//! request into UTF-8 text. Not-found is a distinct failure
//! ([`WorkerError::BlobNotFound`]) because it maps to FILE_ERROR rather
//! than INTERNAL_ERROR.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use cw_core::error::WorkerError;

use crate::config::StorageConfig;

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn fetch_text(&self, key: &str) -> Result<String, WorkerError>;
}

/// Build the configured store.
pub fn from_config(config: &StorageConfig) -> Arc<dyn BlobStore> {
    match config {
        StorageConfig::Http { address, container } => Arc::new(HttpBlobStore::new(
            address.trim_end_matches('/').to_string(),
            container.clone(),
        )),
        StorageConfig::Fs { root } => Arc::new(FsBlobStore::new(root.clone())),
    }
}

/// Blobs as files under a root directory; used for local runs and tests.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn fetch_text(&self, key: &str) -> Result<String, WorkerError> {
        let path = self.root.join(key);
        debug!(key, path = %path.display(), "fetching blob from filesystem");
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(text),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                Err(WorkerError::BlobNotFound(key.to_string()))
            }
            Err(error) => Err(WorkerError::BlobFetch {
                key: key.to_string(),
                message: error.to_string(),
            }),
        }
    }
}

/// Blobs behind a plain HTTP GET endpoint: `{address}/{container}/{key}`.
pub struct HttpBlobStore {
    client: reqwest::Client,
    address: String,
    container: String,
}

impl HttpBlobStore {
    pub fn new(address: String, container: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            address,
            container,
        }
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn fetch_text(&self, key: &str) -> Result<String, WorkerError> {
        let url = format!("{}/{}/{}", self.address, self.container, key);
        debug!(key, url, "fetching blob over HTTP");

        let response =
            self.client
                .get(&url)
                .send()
                .await
                .map_err(|error| WorkerError::BlobFetch {
                    key: key.to_string(),
                    message: error.to_string(),
                })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(WorkerError::BlobNotFound(key.to_string()));
        }
        if !response.status().is_success() {
            return Err(WorkerError::BlobFetch {
                key: key.to_string(),
                message: format!("unexpected status {}", response.status()),
            });
        }

        response
            .text()
            .await
            .map_err(|error| WorkerError::BlobFetch {
                key: key.to_string(),
                message: error.to_string(),
            })
    }
}
