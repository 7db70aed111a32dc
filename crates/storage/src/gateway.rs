//! Whole-object access to the bucket that holds transaction files.
//!
//! The gateway never looks inside a file. It offers get/put/delete/list of
//! complete objects and folds every `object_store` failure into
//! [`GatewayError`]. There is no conditional put: two writers racing on the
//! same key both succeed and the later put wins.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_BUCKET: &str = "flat-file-state-bucket";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("File not found: {key}")]
    NotFound { key: String },
    #[error("Access denied for '{key}': {message}")]
    Auth { key: String, message: String },
    #[error("Failed to write '{key}': {message}")]
    Write { key: String, message: String },
    #[error("Object store error: {message}")]
    Transport { message: String },
    #[error("Invalid object store configuration: {0}")]
    Config(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

#[async_trait]
pub trait ObjectGateway: Send + Sync {
    /// Keys ending in `suffix`, sorted.
    async fn list(&self, suffix: &str) -> GatewayResult<Vec<String>>;

    /// Returns `GatewayError::NotFound` if the key doesn't exist.
    async fn read(&self, key: &str) -> GatewayResult<Bytes>;

    /// Replaces the whole object in a single put.
    async fn write(&self, key: &str, data: Bytes) -> GatewayResult<()>;

    /// Returns `GatewayError::NotFound` if the key doesn't exist.
    async fn delete(&self, key: &str) -> GatewayResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    S3,
    Local,
    #[default]
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub bucket: String,
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible services (MinIO, LocalStack).
    pub endpoint: Option<String>,
    /// Key prefix within the bucket. Empty means the bucket root.
    pub prefix: String,
    pub local_path: Option<PathBuf>,
    /// Deadline applied to each individual store call.
    pub timeout_secs: Option<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            bucket: DEFAULT_BUCKET.to_string(),
            region: None,
            endpoint: None,
            prefix: String::new(),
            local_path: None,
            timeout_secs: None,
        }
    }
}

#[derive(Clone)]
pub struct ObjectStoreGateway {
    store: Arc<dyn ObjectStore>,
    prefix: String,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for ObjectStoreGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStoreGateway")
            .field("store", &self.store.to_string())
            .field("prefix", &self.prefix)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ObjectStoreGateway {
    pub fn new(store: Arc<dyn ObjectStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into().trim_matches('/').to_string(),
            timeout: None,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()), "")
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Credentials for S3 come from the standard `AWS_*` environment
    /// variables; explicit region and endpoint settings override them.
    pub fn from_config(config: &StoreConfig) -> GatewayResult<Self> {
        let store: Arc<dyn ObjectStore> = match config.backend {
            StoreBackend::S3 => {
                let region = config.region.as_deref().ok_or_else(|| {
                    GatewayError::Config("the s3 backend requires a region (AWS_DEFAULT_REGION)".to_string())
                })?;
                let mut builder = AmazonS3Builder::from_env()
                    .with_bucket_name(&config.bucket)
                    .with_region(region);
                if let Some(endpoint) = &config.endpoint {
                    builder = builder
                        .with_endpoint(endpoint)
                        .with_allow_http(endpoint.starts_with("http://"));
                }
                let s3 = builder
                    .build()
                    .map_err(|e| GatewayError::Config(format!("failed to create S3 store: {e}")))?;
                Arc::new(s3)
            }
            StoreBackend::Local => {
                let root = config
                    .local_path
                    .as_ref()
                    .ok_or_else(|| GatewayError::Config("the local backend requires local_path".to_string()))?;
                std::fs::create_dir_all(root)
                    .map_err(|e| GatewayError::Config(format!("cannot create {}: {e}", root.display())))?;
                let local = LocalFileSystem::new_with_prefix(root)
                    .map_err(|e| GatewayError::Config(format!("cannot open {}: {e}", root.display())))?;
                Arc::new(local)
            }
            StoreBackend::Memory => Arc::new(InMemory::new()),
        };

        let gateway = Self::new(store, config.prefix.clone());
        Ok(match config.timeout_secs {
            Some(secs) => gateway.with_timeout(Duration::from_secs(secs)),
            None => gateway,
        })
    }

    fn full_path(&self, key: &str) -> ObjectPath {
        if self.prefix.is_empty() {
            ObjectPath::from(key)
        } else {
            ObjectPath::from(format!("{}/{}", self.prefix, key))
        }
    }

    fn strip_prefix(&self, path: &ObjectPath) -> String {
        let path_str = path.to_string();
        if self.prefix.is_empty() {
            path_str
        } else {
            let prefix_with_slash = format!("{}/", self.prefix);
            path_str
                .strip_prefix(&prefix_with_slash)
                .unwrap_or(&path_str)
                .to_string()
        }
    }

    async fn bounded<T, F>(&self, op: &str, fut: F) -> GatewayResult<T>
    where
        F: Future<Output = GatewayResult<T>> + Send,
    {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, fut).await.unwrap_or_else(|_| {
                Err(GatewayError::Transport {
                    message: format!("{op} timed out after {}s", limit.as_secs_f32()),
                })
            }),
            None => fut.await,
        }
    }
}

/// Failures while writing become `Write`; the same failure on a read is
/// `Transport`.
fn map_error(key: &str, err: object_store::Error, writing: bool) -> GatewayError {
    match &err {
        object_store::Error::NotFound { .. } => GatewayError::NotFound { key: key.to_string() },
        object_store::Error::PermissionDenied { .. } | object_store::Error::Unauthenticated { .. } => {
            GatewayError::Auth {
                key: key.to_string(),
                message: err.to_string(),
            }
        }
        _ if writing => GatewayError::Write {
            key: key.to_string(),
            message: err.to_string(),
        },
        _ => GatewayError::Transport {
            message: format!("{key}: {err}"),
        },
    }
}

#[async_trait]
impl ObjectGateway for ObjectStoreGateway {
    async fn list(&self, suffix: &str) -> GatewayResult<Vec<String>> {
        let prefix = (!self.prefix.is_empty()).then(|| ObjectPath::from(self.prefix.as_str()));
        let objects = self
            .bounded("list", async {
                self.store
                    .list(prefix.as_ref())
                    .try_collect::<Vec<_>>()
                    .await
                    .map_err(|e| map_error("<bucket>", e, false))
            })
            .await?;

        let mut keys: Vec<String> = objects
            .iter()
            .map(|meta| self.strip_prefix(&meta.location))
            .filter(|key| key.ends_with(suffix))
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn read(&self, key: &str) -> GatewayResult<Bytes> {
        let path = self.full_path(key);
        self.bounded("read", async {
            let result = self.store.get(&path).await.map_err(|e| map_error(key, e, false))?;
            result.bytes().await.map_err(|e| map_error(key, e, false))
        })
        .await
    }

    async fn write(&self, key: &str, data: Bytes) -> GatewayResult<()> {
        let path = self.full_path(key);
        self.bounded("write", async {
            self.store
                .put(&path, PutPayload::from(data))
                .await
                .map(|_| ())
                .map_err(|e| map_error(key, e, true))
        })
        .await
    }

    async fn delete(&self, key: &str) -> GatewayResult<()> {
        let path = self.full_path(key);
        self.bounded("delete", async {
            // Object store deletes are idempotent; surface a missing key explicitly.
            self.store.head(&path).await.map_err(|e| map_error(key, e, false))?;
            self.store.delete(&path).await.map_err(|e| map_error(key, e, true))
        })
        .await
    }
}
