use super::{Dataset, StorageBackend, StorageError};
use crate::metrics::{Metrics, Timer};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Records duration and failures of every call into the wrapped backend.
pub struct MeteredStorage {
    inner: Arc<dyn StorageBackend>,
}

impl MeteredStorage {
    pub fn new(inner: Arc<dyn StorageBackend>) -> Self {
        Self { inner }
    }

    fn observe<T>(&self, operation: &str, timer: Timer, result: &Result<T, StorageError>) {
        let metrics = Metrics::get();
        let backend = self.inner.backend_name();
        metrics.record_storage_operation(operation, backend, timer.elapsed_seconds());
        if let Err(e) = result {
            metrics.record_storage_error(operation, backend, e.kind());
        }
    }
}

#[async_trait]
impl StorageBackend for MeteredStorage {
    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }

    async fn list_datasets(&self) -> Result<BTreeSet<String>, StorageError> {
        let timer = Timer::new();
        let result = self.inner.list_datasets().await;
        self.observe("list", timer, &result);
        result
    }

    async fn name_is_available(&self, name: &str) -> Result<bool, StorageError> {
        let timer = Timer::new();
        let result = self.inner.name_is_available(name).await;
        self.observe("name_is_available", timer, &result);
        result
    }

    async fn load_dataset(&self, name: &str) -> Result<Dataset, StorageError> {
        let timer = Timer::new();
        let result = self.inner.load_dataset(name).await;
        self.observe("load", timer, &result);
        result
    }

    async fn add_to_database(&self, table: &RecordBatch, name: &str) -> Result<String, StorageError> {
        let timer = Timer::new();
        let result = self.inner.add_to_database(table, name).await;
        self.observe("add", timer, &result);
        if result.is_ok() {
            Metrics::get().record_dataset_written(self.inner.backend_name());
        }
        result
    }

    async fn remove_dataset(&self, name: &str) -> bool {
        let timer = Timer::new();
        let removed = self.inner.remove_dataset(name).await;
        let metrics = Metrics::get();
        let backend = self.inner.backend_name();
        metrics.record_storage_operation("remove", backend, timer.elapsed_seconds());
        if removed {
            metrics.record_dataset_removed(backend);
        } else {
            metrics.record_storage_error("remove", backend, "remove_failed");
        }
        removed
    }
}
