use super::{ObjectTransport, StorageError};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use std::path::Path;

/// In-process object store backed by a concurrent hashmap.
///
/// Behaves like a bucket for the remote backend without any network.
/// Contents are lost when the transport is dropped.
pub struct MemoryTransport {
    bucket: String,
    objects: DashMap<String, Bytes>,
}

impl MemoryTransport {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: DashMap::new(),
        }
    }

    /// Place raw bytes under `key`, bypassing the table codec.
    pub fn insert(&self, key: impl Into<String>, data: impl Into<Bytes>) {
        self.objects.insert(key.into(), data.into());
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl ObjectTransport for MemoryTransport {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut keys: Vec<String> = self
            .objects
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn download(&self, key: &str, dest: &Path) -> Result<(), StorageError> {
        // Clone out of the map so no shard lock is held across the await.
        let data = match self.objects.get(key) {
            Some(entry) => entry.value().clone(),
            None => return Err(StorageError::NotFound(key.to_owned())),
        };
        tokio::fs::write(dest, &data).await?;
        Ok(())
    }

    async fn upload(&self, src: &Path, key: &str) -> Result<(), StorageError> {
        let data = tokio::fs::read(src).await?;
        self.objects.insert(key.to_owned(), Bytes::from(data));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.objects.remove(key).is_some())
    }

    async fn delete_many(&self, keys: &[String]) -> Result<usize, StorageError> {
        Ok(keys
            .iter()
            .filter(|key| self.objects.remove(key.as_str()).is_some())
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_memory_upload_download() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.bin");
        let dest = dir.path().join("dest.bin");
        std::fs::write(&src, b"payload").unwrap();

        let transport = MemoryTransport::new("bucket");
        transport.upload(&src, "key1").await.unwrap();
        transport.download("key1", &dest).await.unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"payload");
        assert_eq!(transport.bucket(), "bucket");
    }

    #[tokio::test]
    async fn test_memory_download_missing() {
        let dir = TempDir::new().unwrap();
        let transport = MemoryTransport::new("bucket");

        let err = transport
            .download("nonexistent", &dir.path().join("out"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_memory_list_sorted_by_prefix() {
        let transport = MemoryTransport::new("bucket");
        transport.insert("b.arrow", "2");
        transport.insert("a.arrow", "1");
        transport.insert("c.csv", "3");

        assert_eq!(
            transport.list("").await.unwrap(),
            vec!["a.arrow", "b.arrow", "c.csv"]
        );
        assert_eq!(transport.list("b").await.unwrap(), vec!["b.arrow"]);
    }

    #[tokio::test]
    async fn test_memory_delete() {
        let transport = MemoryTransport::new("bucket");
        transport.insert("key1", "value1");
        transport.insert("key2", "value2");

        assert!(transport.delete("key1").await.unwrap());
        assert!(!transport.delete("key1").await.unwrap());

        let removed = transport
            .delete_many(&["key2".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(transport.is_empty());
    }
}
