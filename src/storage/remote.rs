use super::{
    display_name, has_snapshot_extension, normalize_key, validate_name, validate_write_name,
    Dataset, ObjectStoreClient, StorageBackend, StorageError, LEGACY_CSV_SUFFIX,
};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Datasets stored as objects in one bucket.
///
/// Objects written elsewhere with a `.csv` suffix are listed and loadable
/// under their full key; every write produces a snapshot object.
pub struct RemoteObjectStorage {
    client: ObjectStoreClient,
}

impl RemoteObjectStorage {
    pub fn new(client: ObjectStoreClient) -> Self {
        Self { client }
    }

    fn object_key(name: &str) -> Result<String, StorageError> {
        validate_name(name)?;
        if name.ends_with(LEGACY_CSV_SUFFIX) {
            Ok(name.to_owned())
        } else {
            Ok(normalize_key(name))
        }
    }
}

#[async_trait]
impl StorageBackend for RemoteObjectStorage {
    fn backend_name(&self) -> &'static str {
        "remote"
    }

    async fn list_datasets(&self) -> Result<BTreeSet<String>, StorageError> {
        let keys = self.client.list_objects("").await?;
        Ok(keys
            .iter()
            .filter(|key| has_snapshot_extension(key) || key.ends_with(LEGACY_CSV_SUFFIX))
            .filter(|key| validate_name(key).is_ok())
            .map(|key| display_name(key).to_owned())
            .collect())
    }

    async fn load_dataset(&self, name: &str) -> Result<Dataset, StorageError> {
        let key = Self::object_key(name)?;
        let table = self.client.load_object(&key).await?;
        debug!(bucket = self.client.bucket(), key = %key, "loaded dataset");
        Ok(Dataset::new(table, key))
    }

    async fn add_to_database(&self, table: &RecordBatch, name: &str) -> Result<String, StorageError> {
        validate_write_name(name)?;
        self.client.upload_object(table, name).await
    }

    async fn remove_dataset(&self, name: &str) -> bool {
        let key = match Self::object_key(name) {
            Ok(key) => key,
            Err(e) => {
                warn!("Refusing to remove dataset '{}': {}", name, e);
                return false;
            }
        };

        match self.client.delete_object(&key).await {
            Ok(true) => true,
            Ok(false) => {
                warn!("Dataset not found for removal: {}", key);
                false
            }
            Err(e) => {
                warn!("Failed to remove dataset {}: {}", key, e);
                false
            }
        }
    }
}
