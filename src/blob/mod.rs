//! Content-addressed blob storage for fetched binaries
//!
//! Objects are named `<content hash>-<basename>` and the store returns the
//! URL (or local path) recorded on the document.

use crate::config::{BlobConfig, BlobKind};
use crate::url::basename;
use crate::{ConfigError, CrawlError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

/// Upload target for document bytes
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores `bytes` under `name` and returns where it can be read back
    async fn upload(&self, name: &str, bytes: Vec<u8>) -> Result<String>;
}

/// Builds the object name for a document
///
/// Directory URLs have no basename and use `index`.
pub fn blob_name(hash: &str, url: &Url) -> String {
    format!("{}-{}", hash, basename(url).unwrap_or("index"))
}

/// Builds the configured blob store
pub fn from_config(config: &BlobConfig, client: Client) -> std::result::Result<Arc<dyn BlobStore>, ConfigError> {
    match config.kind {
        BlobKind::Local => {
            let directory = config.directory.clone().ok_or_else(|| {
                ConfigError::Validation("local blob store requires a directory".to_string())
            })?;
            Ok(Arc::new(LocalBlobStore::new(
                directory,
                config.public_base_url.clone(),
            )))
        }
        BlobKind::Http => {
            let upload_url = config.upload_url.clone().ok_or_else(|| {
                ConfigError::Validation("http blob store requires upload-url".to_string())
            })?;
            Ok(Arc::new(HttpBlobStore::new(
                client,
                upload_url,
                config.public_base_url.clone(),
            )))
        }
    }
}

fn join_url(base: &str, name: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), name)
}

/// Writes blobs into a local directory
pub struct LocalBlobStore {
    directory: PathBuf,
    public_base_url: Option<String>,
}

impl LocalBlobStore {
    pub fn new(directory: impl Into<PathBuf>, public_base_url: Option<String>) -> Self {
        Self {
            directory: directory.into(),
            public_base_url,
        }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn upload(&self, name: &str, bytes: Vec<u8>) -> Result<String> {
        tokio::fs::create_dir_all(&self.directory).await?;
        let path = self.directory.join(name);
        tokio::fs::write(&path, bytes).await?;

        Ok(match &self.public_base_url {
            Some(base) => join_url(base, name),
            None => path.display().to_string(),
        })
    }
}

/// PUTs blobs to an HTTP object store
pub struct HttpBlobStore {
    client: Client,
    upload_url: String,
    public_base_url: Option<String>,
}

impl HttpBlobStore {
    pub fn new(client: Client, upload_url: String, public_base_url: Option<String>) -> Self {
        Self {
            client,
            upload_url,
            public_base_url,
        }
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn upload(&self, name: &str, bytes: Vec<u8>) -> Result<String> {
        let target = join_url(&self.upload_url, name);

        let response = self
            .client
            .put(&target)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes)
            .send()
            .await
            .map_err(|source| CrawlError::Http {
                url: target.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CrawlError::Blob {
                name: name.to_string(),
                message: format!("upload returned {}", status),
            });
        }

        Ok(match &self.public_base_url {
            Some(base) => join_url(base, name),
            None => target,
        })
    }
}
