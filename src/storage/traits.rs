use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeSet;

use super::snapshot::SNAPSHOT_EXTENSION;

/// A named table, the unit of persistence.
///
/// Backends hand out freshly built instances on load and keep no record of
/// them afterwards; the holder owns the table outright.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub table: RecordBatch,
    pub name: String,
}

impl Dataset {
    pub fn new(table: RecordBatch, name: impl Into<String>) -> Self {
        Self {
            table,
            name: name.into(),
        }
    }

    /// Name with the snapshot extension removed.
    pub fn display_name(&self) -> &str {
        display_name(&self.name)
    }
}

/// Shape summary of a stored dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetInfo {
    pub name: String,
    pub rows: usize,
    pub columns: Vec<ColumnInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub null_count: usize,
}

impl DatasetInfo {
    pub fn from_dataset(dataset: &Dataset) -> Self {
        let schema = dataset.table.schema();
        let columns = schema
            .fields()
            .iter()
            .zip(dataset.table.columns())
            .map(|(field, column)| ColumnInfo {
                name: field.name().clone(),
                data_type: field.data_type().to_string(),
                null_count: column.null_count(),
            })
            .collect();

        Self {
            name: dataset.display_name().to_owned(),
            rows: dataset.table.num_rows(),
            columns,
        }
    }
}

/// Suffix reserved for legacy delimited-text objects, which are readable but
/// never written.
pub const LEGACY_CSV_SUFFIX: &str = ".csv";

/// Append the snapshot extension unless `name` already carries it.
pub fn normalize_key(name: &str) -> String {
    if has_snapshot_extension(name) {
        name.to_owned()
    } else {
        format!("{}.{}", name, SNAPSHOT_EXTENSION)
    }
}

/// Strip the snapshot extension, if present.
pub fn display_name(key: &str) -> &str {
    key.strip_suffix(SNAPSHOT_EXTENSION)
        .and_then(|rest| rest.strip_suffix('.'))
        .unwrap_or(key)
}

pub fn has_snapshot_extension(name: &str) -> bool {
    name.len() > SNAPSHOT_EXTENSION.len()
        && name.ends_with(SNAPSHOT_EXTENSION)
        && name[..name.len() - SNAPSHOT_EXTENSION.len()].ends_with('.')
}

/// Reject names that cannot map to a single flat key.
pub fn validate_name(name: &str) -> Result<(), StorageError> {
    let bare = display_name(name);
    if bare.trim().is_empty() {
        return Err(StorageError::InvalidInput("dataset name is empty".to_string()));
    }
    // Leading dots are reserved for hidden staging files.
    if bare.starts_with('.') {
        return Err(StorageError::InvalidInput(format!(
            "dataset name '{}' must not start with '.'",
            bare
        )));
    }
    if bare.contains(['/', '\\', '\0']) {
        return Err(StorageError::InvalidInput(format!(
            "dataset name '{}' contains a path separator",
            bare
        )));
    }
    Ok(())
}

/// Like [`validate_name`], and additionally refuses the legacy CSV suffix so a
/// written snapshot can never be shadowed by the legacy read path.
pub fn validate_write_name(name: &str) -> Result<(), StorageError> {
    validate_name(name)?;
    if display_name(name).ends_with(LEGACY_CSV_SUFFIX) {
        return Err(StorageError::InvalidInput(format!(
            "dataset name '{}' uses the read-only '{}' suffix",
            name, LEGACY_CSV_SUFFIX
        )));
    }
    Ok(())
}

/// Dataset persistence contract shared by the local and remote backends.
///
/// Implementations are shared process-wide behind an `Arc` and must tolerate
/// concurrent calls. There is no cross-call locking: concurrent writes to one
/// name are last-write-wins.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Short label used in logs and metrics.
    fn backend_name(&self) -> &'static str;

    /// All stored dataset names, extension stripped.
    async fn list_datasets(&self) -> Result<BTreeSet<String>, StorageError>;

    /// True if `name` is not currently stored and could be written.
    async fn name_is_available(&self, name: &str) -> Result<bool, StorageError> {
        if validate_write_name(name).is_err() {
            return Ok(false);
        }
        let existing = self.list_datasets().await?;
        Ok(!existing.contains(display_name(name)))
    }

    /// Load a dataset by name, with or without the snapshot extension.
    async fn load_dataset(&self, name: &str) -> Result<Dataset, StorageError>;

    /// Store `table` under `name`, silently replacing any existing dataset.
    /// Returns the final key.
    async fn add_to_database(&self, table: &RecordBatch, name: &str)
        -> Result<String, StorageError>;

    /// Delete a dataset. Failures, including a missing dataset, are reported
    /// as `false` rather than raised.
    async fn remove_dataset(&self, name: &str) -> bool;

    /// Store `table` only if `name` is available.
    ///
    /// The check and the write are separate calls, so a concurrent writer can
    /// slip in between them and be overwritten. Accepted for single-writer use.
    async fn insert_dataset(&self, table: &RecordBatch, name: &str) -> Result<String, StorageError> {
        validate_write_name(name)?;
        if !self.name_is_available(name).await? {
            return Err(StorageError::NameConflict(display_name(name).to_owned()));
        }
        self.add_to_database(table, name).await
    }

    /// Row/column summary of a stored dataset.
    async fn dataset_info(&self, name: &str) -> Result<DatasetInfo, StorageError> {
        let dataset = self.load_dataset(name).await?;
        Ok(DatasetInfo::from_dataset(&dataset))
    }
}

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Dataset not found: {0}")]
    NotFound(String),
    #[error("Corrupt data: {0}")]
    CorruptData(String),
    #[error("Storage I/O error: {0}")]
    Io(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Name already in use: {0}")]
    NameConflict(String),
    #[error("Storage operation timed out: {0}")]
    Timeout(String),
}

impl StorageError {
    /// Stable label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            StorageError::NotFound(_) => "not_found",
            StorageError::CorruptData(_) => "corrupt_data",
            StorageError::Io(_) => "io",
            StorageError::InvalidInput(_) => "invalid_input",
            StorageError::NameConflict(_) => "name_conflict",
            StorageError::Timeout(_) => "timeout",
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut => StorageError::Timeout(err.to_string()),
            _ => StorageError::Io(err.to_string()),
        }
    }
}
