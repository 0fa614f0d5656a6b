//! Dataset storage backends and abstractions.
//!
//! Provides pluggable dataset persistence with a local-directory backend and
//! an object-store backend, selected once per process.

pub mod local;
pub mod memory;
pub mod metered;
pub mod object_store;
pub mod remote;
#[cfg(feature = "s3-backend")]
pub mod s3;
pub mod snapshot;
pub mod traits;

pub use object_store::{ObjectStoreClient, ObjectTransport};
pub use traits::*;

use crate::config::StorageConfig;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Builds the single backend a process works against.
pub struct StorageFactory;

impl StorageFactory {
    /// Create the backend named by `config`, instrumented with metrics.
    pub async fn from_config(config: &StorageConfig) -> Result<Arc<dyn StorageBackend>, StorageError> {
        let backend = match config {
            StorageConfig::File { path } => Self::create_file(path).await?,
            StorageConfig::Remote(remote) => Self::create_remote(remote).await?,
        };
        info!("Using {} storage backend", backend.backend_name());
        Ok(Arc::new(metered::MeteredStorage::new(backend)))
    }

    pub async fn create_file<P: AsRef<Path>>(path: P) -> Result<Arc<dyn StorageBackend>, StorageError> {
        Ok(Arc::new(local::LocalFileStorage::new(path).await?))
    }

    #[cfg(feature = "s3-backend")]
    pub async fn create_remote(
        config: &crate::config::RemoteConfig,
    ) -> Result<Arc<dyn StorageBackend>, StorageError> {
        let transport = s3::S3Transport::new(config).await?;
        let client = ObjectStoreClient::new(Arc::new(transport));
        Ok(Arc::new(remote::RemoteObjectStorage::new(client)))
    }

    #[cfg(not(feature = "s3-backend"))]
    pub async fn create_remote(
        _config: &crate::config::RemoteConfig,
    ) -> Result<Arc<dyn StorageBackend>, StorageError> {
        Err(StorageError::InvalidInput(
            "remote backend requires the s3-backend feature".to_string(),
        ))
    }

    /// Remote backend over an in-process bucket.
    pub fn create_in_memory(bucket: &str) -> Arc<dyn StorageBackend> {
        let transport = Arc::new(memory::MemoryTransport::new(bucket));
        Arc::new(remote::RemoteObjectStorage::new(ObjectStoreClient::new(transport)))
    }
}
