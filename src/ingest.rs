//! Decoding of user-supplied files into tables.

use crate::storage::snapshot::{read_csv, read_snapshot, SNAPSHOT_EXTENSION};
use crate::storage::StorageError;
use arrow::record_batch::RecordBatch;
use std::fs::File;
use std::path::Path;

/// Read a CSV or Arrow IPC file, choosing the decoder by extension.
pub fn read_table<P: AsRef<Path>>(path: P) -> Result<RecordBatch, StorageError> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "csv" => read_csv(File::open(path)?),
        SNAPSHOT_EXTENSION | "ipc" => read_snapshot(File::open(path)?),
        _ => Err(StorageError::InvalidInput(format!(
            "file type not supported: {}",
            path.display()
        ))),
    }
}

/// Dataset name suggested for an ingested file: its stem.
pub fn default_name<P: AsRef<Path>>(path: P) -> Option<String> {
    path.as_ref()
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_owned)
}
