//! Object-store gateway (`§4.10`, `§9` Design Notes): the one pluggable,
//! dynamically-dispatched seam in the worker.

use std::path::PathBuf;

use async_trait::async_trait;
use facas_core::config::ImageStorageConfig;
use tracing::{debug, warn};

use crate::errors::StorageError;

pub struct UploadRequest {
    pub bucket: String,
    pub key: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
}

pub struct UploadResult {
    pub uri: String,
    pub etag: String,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(&self, request: UploadRequest) -> Result<UploadResult, StorageError>;
    async fn exists(&self, bucket: &str, key: &str) -> Result<bool, StorageError>;
}

/// `StorageProvider::None` (`§4.10`): records `uploadStatus = disabled`
/// without any I/O.
pub struct NullObjectStore;

#[async_trait]
impl ObjectStore for NullObjectStore {
    async fn upload(&self, request: UploadRequest) -> Result<UploadResult, StorageError> {
        debug!(bucket = %request.bucket, key = %request.key, "null object store: upload is a no-op");
        Ok(UploadResult { uri: String::new(), etag: String::new() })
    }

    async fn exists(&self, _bucket: &str, _key: &str) -> Result<bool, StorageError> {
        Ok(false)
    }
}

/// `StorageProvider::S3`: no object-storage SDK is in this corpus's
/// dependency stack, so objects are persisted to a local directory tree
/// keyed exactly the way an S3 bucket/key pair would be, with the same
/// HEAD-before-PUT and public-URL semantics the real thing would expose.
pub struct FilesystemObjectStore {
    root: PathBuf,
    public_base_url: Option<String>,
}

impl FilesystemObjectStore {
    pub fn new(config: &ImageStorageConfig) -> Self {
        FilesystemObjectStore {
            root: PathBuf::from(&config.bucket),
            public_base_url: config.public_base_url.clone(),
        }
    }

    fn path_for(&self, bucket: &str, key: &str) -> PathBuf {
        self.root.join(bucket).join(key)
    }
}

#[async_trait]
impl ObjectStore for FilesystemObjectStore {
    async fn upload(&self, request: UploadRequest) -> Result<UploadResult, StorageError> {
        let path = self.path_for(&request.bucket, &request.key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::Upload(e.to_string()))?;
        }
        tokio::fs::write(&path, &request.bytes)
            .await
            .map_err(|e| StorageError::Upload(e.to_string()))?;

        let etag = facas_core::hashing::fingerprint_bytes(&request.bytes);
        let uri = match &self.public_base_url {
            Some(base) => format!("{}/{}/{}", base.trim_end_matches('/'), request.bucket, request.key),
            None => path.display().to_string(),
        };
        Ok(UploadResult { uri, etag })
    }

    async fn exists(&self, bucket: &str, key: &str) -> Result<bool, StorageError> {
        let path = self.path_for(bucket, key);
        match tokio::fs::metadata(&path).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => {
                warn!(error = %e, "object store probe failed");
                Err(StorageError::Probe(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_store_reports_non_existence() {
        let store = NullObjectStore;
        assert!(!store.exists("bucket", "key").await.unwrap());
    }

    #[tokio::test]
    async fn filesystem_store_round_trips_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = ImageStorageConfig {
            bucket: dir.path().join("bucket").to_string_lossy().to_string(),
            ..ImageStorageConfig::default()
        };
        let store = FilesystemObjectStore::new(&config);
        assert!(!store.exists("bucket", "a.png").await.unwrap());

        store
            .upload(UploadRequest {
                bucket: "bucket".into(),
                key: "a.png".into(),
                bytes: vec![1, 2, 3],
                content_type: "image/png".into(),
            })
            .await
            .unwrap();

        assert!(store.exists("bucket", "a.png").await.unwrap());
    }
}
