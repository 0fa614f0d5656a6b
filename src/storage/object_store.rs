use super::snapshot::{self, TableFormat};
use super::{normalize_key, StorageError};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::debug;

/// Byte-level access to one bucket.
///
/// The seam between [`ObjectStoreClient`] and the network: the S3 transport
/// talks to a real service, the memory transport keeps objects in-process.
#[async_trait]
pub trait ObjectTransport: Send + Sync {
    fn bucket(&self) -> &str;

    /// Keys starting with `prefix`, in lexicographic order.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// Write the object's bytes to `dest`. `NotFound` if the key is absent.
    async fn download(&self, key: &str, dest: &Path) -> Result<(), StorageError>;

    /// Store the contents of `src` under `key`, replacing any existing object.
    async fn upload(&self, src: &Path, key: &str) -> Result<(), StorageError>;

    /// Delete exactly `key`. Returns false if it did not exist.
    async fn delete(&self, key: &str) -> Result<bool, StorageError>;

    /// Delete the given keys, returning how many were removed.
    async fn delete_many(&self, keys: &[String]) -> Result<usize, StorageError>;
}

/// Table-level object operations against a single bucket.
///
/// Every load and upload goes through a temporary file that is removed when
/// it drops, on success and error paths alike.
#[derive(Clone)]
pub struct ObjectStoreClient {
    transport: Arc<dyn ObjectTransport>,
    scratch_dir: PathBuf,
}

impl ObjectStoreClient {
    pub fn new(transport: Arc<dyn ObjectTransport>) -> Self {
        Self {
            transport,
            scratch_dir: std::env::temp_dir(),
        }
    }

    /// Place temporary files in `dir` instead of the system temp directory.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    pub fn bucket(&self) -> &str {
        self.transport.bucket()
    }

    /// All keys matching `prefix`; an empty bucket yields an empty list.
    pub async fn list_objects(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let keys = self.transport.list(prefix).await?;
        debug!(bucket = self.bucket(), prefix, count = keys.len(), "listed objects");
        Ok(keys)
    }

    /// Download `key` and decode it according to its suffix.
    pub async fn load_object(&self, key: &str) -> Result<RecordBatch, StorageError> {
        let format = TableFormat::from_key(key)?;
        let scratch = NamedTempFile::new_in(&self.scratch_dir)?;

        self.transport.download(key, scratch.path()).await?;

        let file = scratch.reopen()?;
        let table = snapshot::read_table(file, format)?;
        debug!(bucket = self.bucket(), key, rows = table.num_rows(), "loaded object");
        Ok(table)
    }

    /// Encode `table` as a snapshot and upload it. The snapshot extension is
    /// appended to `key` if missing; the final key is returned.
    pub async fn upload_object(&self, table: &RecordBatch, key: &str) -> Result<String, StorageError> {
        let object_key = normalize_key(key);
        let mut scratch = NamedTempFile::new_in(&self.scratch_dir)?;

        snapshot::write_snapshot(table, scratch.as_file_mut())?;
        self.transport.upload(scratch.path(), &object_key).await?;

        debug!(bucket = self.bucket(), key = %object_key, rows = table.num_rows(), "uploaded object");
        Ok(object_key)
    }

    /// Delete a single object by its exact key.
    pub async fn delete_object(&self, key: &str) -> Result<bool, StorageError> {
        self.transport.delete(key).await
    }

    /// Delete every object whose key starts with `prefix`. An empty prefix
    /// clears the bucket.
    pub async fn delete_objects(&self, prefix: &str) -> Result<usize, StorageError> {
        let keys = self.transport.list(prefix).await?;
        if keys.is_empty() {
            return Ok(0);
        }
        let deleted = self.transport.delete_many(&keys).await?;
        debug!(bucket = self.bucket(), prefix, deleted, "deleted objects by prefix");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryTransport;
    use arrow::array::{ArrayRef, Int32Array, StringArray};

    fn client() -> (ObjectStoreClient, Arc<MemoryTransport>) {
        let transport = Arc::new(MemoryTransport::new("test-bucket"));
        (ObjectStoreClient::new(transport.clone()), transport)
    }

    fn table() -> RecordBatch {
        let a: ArrayRef = Arc::new(Int32Array::from(vec![1, 2, 3]));
        let b: ArrayRef = Arc::new(StringArray::from(vec!["x", "y", "z"]));
        RecordBatch::try_from_iter(vec![("a", a), ("b", b)]).unwrap()
    }

    #[tokio::test]
    async fn test_upload_appends_extension_once() {
        let (client, _) = client();

        assert_eq!(client.upload_object(&table(), "sales").await.unwrap(), "sales.arrow");
        assert_eq!(client.upload_object(&table(), "other.arrow").await.unwrap(), "other.arrow");
        assert_eq!(
            client.list_objects("").await.unwrap(),
            vec!["other.arrow".to_string(), "sales.arrow".to_string()]
        );
    }

    #[tokio::test]
    async fn test_load_uploaded_object() {
        let (client, _) = client();
        let key = client.upload_object(&table(), "sales").await.unwrap();

        assert_eq!(client.load_object(&key).await.unwrap(), table());
    }

    #[tokio::test]
    async fn test_load_legacy_csv_object() {
        let (client, transport) = client();
        transport.insert("legacy.csv", "a,b\n1,x\n2,y\n");

        let table = client.load_object("legacy.csv").await.unwrap();
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.num_columns(), 2);
    }

    #[tokio::test]
    async fn test_load_errors_are_distinct() {
        let (client, transport) = client();
        transport.insert("broken.arrow", "not a snapshot");
        transport.insert("sheet.xlsx", "whatever");

        assert!(matches!(
            client.load_object("missing.arrow").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            client.load_object("broken.arrow").await,
            Err(StorageError::CorruptData(_))
        ));
        assert!(matches!(
            client.load_object("sheet.xlsx").await,
            Err(StorageError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_list_with_prefix() {
        let (client, _) = client();
        client.upload_object(&table(), "sales").await.unwrap();
        client.upload_object(&table(), "sales_2024").await.unwrap();
        client.upload_object(&table(), "costs").await.unwrap();

        assert_eq!(client.list_objects("sales").await.unwrap().len(), 2);
        assert!(client.list_objects("nothing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_object_is_exact() {
        let (client, _) = client();
        client.upload_object(&table(), "sales").await.unwrap();
        client.upload_object(&table(), "sales_2024").await.unwrap();

        assert!(client.delete_object("sales.arrow").await.unwrap());
        assert!(!client.delete_object("sales.arrow").await.unwrap());
        assert_eq!(client.list_objects("").await.unwrap(), vec!["sales_2024.arrow".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_objects_by_prefix() {
        let (client, _) = client();
        client.upload_object(&table(), "sales").await.unwrap();
        client.upload_object(&table(), "sales_2024").await.unwrap();
        client.upload_object(&table(), "costs").await.unwrap();

        assert_eq!(client.delete_objects("sales").await.unwrap(), 2);
        assert_eq!(client.delete_objects("sales").await.unwrap(), 0);
        assert_eq!(client.list_objects("").await.unwrap(), vec!["costs.arrow".to_string()]);

        assert_eq!(client.delete_objects("").await.unwrap(), 1);
        assert!(client.list_objects("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_scratch_files_are_cleaned_up() {
        let scratch = tempfile::TempDir::new().unwrap();
        let (client, transport) = client();
        let client = client.with_scratch_dir(scratch.path());
        transport.insert("broken.arrow", "garbage");

        for _ in 0..5 {
            let key = client.upload_object(&table(), "sales").await.unwrap();
            client.load_object(&key).await.unwrap();
            assert!(client.load_object("missing.arrow").await.is_err());
            assert!(client.load_object("broken.arrow").await.is_err());
        }

        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }
}
