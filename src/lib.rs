pub mod cli;
pub mod config;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod storage;
pub mod telemetry;

pub use config::{Config, RemoteConfig, StorageConfig};
pub use storage::{Dataset, StorageBackend, StorageError, StorageFactory};
