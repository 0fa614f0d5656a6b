use opentelemetry::metrics::{Counter, Histogram};
use opentelemetry::{global, KeyValue};
use std::sync::OnceLock;
use std::time::Instant;

/// OpenTelemetry metrics for dataset storage.
///
/// Tracks storage operations, their latency, failures, and dataset churn.
/// Singleton instance accessed via `Metrics::get()`.
pub struct Metrics {
    pub storage_operations_total: Counter<u64>,
    pub storage_operation_duration: Histogram<f64>,
    pub storage_errors_total: Counter<u64>,

    pub datasets_written_total: Counter<u64>,
    pub datasets_removed_total: Counter<u64>,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

impl Metrics {
    pub fn init() -> &'static Self {
        METRICS.get_or_init(|| {
            let meter = global::meter("coral-datasets");

            Metrics {
                storage_operations_total: meter
                    .u64_counter("coral_storage_operations_total")
                    .with_description("Total number of storage operations")
                    .init(),

                storage_operation_duration: meter
                    .f64_histogram("coral_storage_operation_duration_seconds")
                    .with_description("Storage operation duration in seconds")
                    .init(),

                storage_errors_total: meter
                    .u64_counter("coral_storage_errors_total")
                    .with_description("Total number of storage errors")
                    .init(),

                datasets_written_total: meter
                    .u64_counter("coral_datasets_written_total")
                    .with_description("Total number of datasets written")
                    .init(),

                datasets_removed_total: meter
                    .u64_counter("coral_datasets_removed_total")
                    .with_description("Total number of datasets removed")
                    .init(),
            }
        })
    }

    pub fn get() -> &'static Self {
        METRICS.get().unwrap_or_else(|| {
            // For tests, initialize with defaults if not already initialized
            Self::init()
        })
    }

    pub fn record_storage_operation(&self, operation: &str, backend: &str, duration: f64) {
        let labels = &[
            KeyValue::new("operation", operation.to_string()),
            KeyValue::new("backend", backend.to_string()),
        ];
        self.storage_operations_total.add(1, labels);
        self.storage_operation_duration.record(duration, labels);
    }

    pub fn record_storage_error(&self, operation: &str, backend: &str, error_type: &str) {
        let labels = &[
            KeyValue::new("operation", operation.to_string()),
            KeyValue::new("backend", backend.to_string()),
            KeyValue::new("error_type", error_type.to_string()),
        ];
        self.storage_errors_total.add(1, labels);
    }

    pub fn record_dataset_written(&self, backend: &str) {
        self.datasets_written_total
            .add(1, &[KeyValue::new("backend", backend.to_string())]);
    }

    pub fn record_dataset_removed(&self, backend: &str) {
        self.datasets_removed_total
            .add(1, &[KeyValue::new("backend", backend.to_string())]);
    }
}

// Timer utility for measuring durations
pub struct Timer {
    start: Instant,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}
