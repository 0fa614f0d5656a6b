use super::snapshot::{decode_snapshot, encode_snapshot};
use super::{
    display_name, has_snapshot_extension, normalize_key, validate_name, validate_write_name,
    Dataset, StorageBackend, StorageError,
};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Datasets stored as snapshot files in one flat directory.
///
/// Writes land in a hidden temporary file first and are renamed into place,
/// so readers never observe a half-written snapshot.
pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    /// Open `root`, creating the directory if it does not exist.
    pub async fn new<P: AsRef<Path>>(root: P) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> Result<(String, PathBuf), StorageError> {
        validate_name(name)?;
        let key = normalize_key(name);
        let path = self.root.join(&key);
        Ok((key, path))
    }
}

#[async_trait]
impl StorageBackend for LocalFileStorage {
    fn backend_name(&self) -> &'static str {
        "file"
    }

    async fn list_datasets(&self) -> Result<BTreeSet<String>, StorageError> {
        let mut names = BTreeSet::new();
        let mut entries = tokio::fs::read_dir(&self.root).await?;

        while let Some(entry) = entries.next_entry().await? {
            // Follows symlinks, matching what `load_dataset` can read.
            match tokio::fs::metadata(entry.path()).await {
                Ok(metadata) if metadata.is_file() => {}
                _ => continue,
            }
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if file_name.starts_with('.') || !has_snapshot_extension(file_name) {
                continue;
            }
            names.insert(display_name(file_name).to_owned());
        }

        Ok(names)
    }

    async fn load_dataset(&self, name: &str) -> Result<Dataset, StorageError> {
        let (key, path) = self.path_for(name)?;

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(key));
            }
            Err(e) => return Err(e.into()),
        };

        let table = decode_snapshot(&bytes)?;
        debug!(path = %path.display(), rows = table.num_rows(), "loaded dataset");
        Ok(Dataset::new(table, key))
    }

    async fn add_to_database(&self, table: &RecordBatch, name: &str) -> Result<String, StorageError> {
        validate_write_name(name)?;
        let (key, path) = self.path_for(name)?;
        let bytes = encode_snapshot(table)?;

        // Kept short so any key that fits the filesystem's name limit can be staged.
        let staging = self
            .root
            .join(format!(".{}.tmp", uuid::Uuid::new_v4().simple()));

        if let Err(e) = tokio::fs::write(&staging, &bytes).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&staging, &path).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e.into());
        }

        debug!(path = %path.display(), size = bytes.len(), "stored dataset");
        Ok(key)
    }

    async fn remove_dataset(&self, name: &str) -> bool {
        let (key, path) = match self.path_for(name) {
            Ok(target) => target,
            Err(e) => {
                warn!("Refusing to remove dataset '{}': {}", name, e);
                return false;
            }
        };

        match tokio::fs::remove_file(&path).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to remove dataset {}: {}", key, e);
                false
            }
        }
    }
}
