use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::record_batch::RecordBatch;
use coral_datasets::storage::local::LocalFileStorage;
use coral_datasets::storage::memory::MemoryTransport;
use coral_datasets::storage::metered::MeteredStorage;
use coral_datasets::storage::remote::RemoteObjectStorage;
use coral_datasets::storage::ObjectStoreClient;
use coral_datasets::{StorageBackend, StorageError, StorageFactory};
use std::sync::Arc;
use tempfile::TempDir;

fn sales_table() -> RecordBatch {
    let a: ArrayRef = Arc::new(Int64Array::from(vec![1, 2, 3]));
    let b: ArrayRef = Arc::new(StringArray::from(vec!["north", "south", "east"]));
    RecordBatch::try_from_iter(vec![("a", a), ("b", b)]).unwrap()
}

fn wide_table(rows: usize) -> RecordBatch {
    let ids: ArrayRef = Arc::new(Int64Array::from_iter_values(0..rows as i64));
    let values: ArrayRef = Arc::new(Float64Array::from_iter(
        (0..rows).map(|i| if i % 7 == 0 { None } else { Some(i as f64 * 0.5) }),
    ));
    RecordBatch::try_from_iter(vec![("id", ids), ("value", values)]).unwrap()
}

/// Every backend under test, each behind the shared handle type.
async fn backends() -> Vec<(Arc<dyn StorageBackend>, Option<TempDir>)> {
    let dir = TempDir::new().unwrap();
    let local: Arc<dyn StorageBackend> = Arc::new(LocalFileStorage::new(dir.path()).await.unwrap());

    let remote: Arc<dyn StorageBackend> = Arc::new(RemoteObjectStorage::new(ObjectStoreClient::new(
        Arc::new(MemoryTransport::new("datasets")),
    )));

    let metered: Arc<dyn StorageBackend> =
        Arc::new(MeteredStorage::new(StorageFactory::create_in_memory("metered")));

    vec![(local, Some(dir)), (remote, None), (metered, None)]
}

#[tokio::test]
async fn test_sales_scenario() {
    for (storage, _guard) in backends().await {
        let table = sales_table();

        storage.add_to_database(&table, "sales").await.unwrap();
        assert!(storage.list_datasets().await.unwrap().contains("sales"));

        let dataset = storage.load_dataset("sales").await.unwrap();
        assert_eq!(dataset.table.num_rows(), 3);
        assert_eq!(dataset.table.num_columns(), 2);
        assert_eq!(dataset.table, table);

        assert!(storage.remove_dataset("sales").await);
        assert!(!storage.list_datasets().await.unwrap().contains("sales"));
    }
}

#[tokio::test]
async fn test_load_missing_on_empty_store() {
    for (storage, _guard) in backends().await {
        assert!(storage.list_datasets().await.unwrap().is_empty());
        let result = storage.load_dataset("missing").await;
        assert!(
            matches!(result, Err(StorageError::NotFound(_))),
            "{} backend returned {:?}",
            storage.backend_name(),
            result.map(|d| d.name)
        );
    }
}

#[tokio::test]
async fn test_round_trip_preserves_content() {
    for (storage, _guard) in backends().await {
        let table = wide_table(2_500);
        storage.add_to_database(&table, "wide").await.unwrap();

        let loaded = storage.load_dataset("wide").await.unwrap();
        assert_eq!(loaded.table.schema(), table.schema());
        assert_eq!(loaded.table, table);
    }
}

#[tokio::test]
async fn test_name_listed_exactly_once() {
    for (storage, _guard) in backends().await {
        storage.add_to_database(&sales_table(), "sales").await.unwrap();
        storage.add_to_database(&sales_table(), "sales").await.unwrap();
        storage.add_to_database(&sales_table(), "sales.arrow").await.unwrap();

        let names = storage.list_datasets().await.unwrap();
        assert_eq!(names.iter().filter(|n| n.as_str() == "sales").count(), 1);
        assert_eq!(names.len(), 1);
    }
}

#[tokio::test]
async fn test_remove_then_load_fails() {
    for (storage, _guard) in backends().await {
        storage.add_to_database(&sales_table(), "sales").await.unwrap();
        assert!(storage.remove_dataset("sales").await);

        assert!(matches!(
            storage.load_dataset("sales").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(!storage.remove_dataset("sales").await);
        assert!(!storage.remove_dataset("never-existed").await);
    }
}

#[tokio::test]
async fn test_name_availability_follows_writes() {
    for (storage, _guard) in backends().await {
        assert!(storage.name_is_available("sales").await.unwrap());

        storage.add_to_database(&sales_table(), "sales").await.unwrap();
        assert!(!storage.name_is_available("sales").await.unwrap());
        assert!(!storage.name_is_available("sales.arrow").await.unwrap());

        assert!(storage.remove_dataset("sales").await);
        assert!(storage.name_is_available("sales").await.unwrap());
    }
}

#[tokio::test]
async fn test_load_is_idempotent() {
    for (storage, _guard) in backends().await {
        storage.add_to_database(&sales_table(), "sales").await.unwrap();

        let first = storage.load_dataset("sales").await.unwrap();
        let second = storage.load_dataset("sales").await.unwrap();
        assert_eq!(first.table, second.table);
        assert_eq!(first.name, second.name);
    }
}

#[tokio::test]
async fn test_insert_dataset_refuses_taken_name() {
    for (storage, _guard) in backends().await {
        storage.insert_dataset(&sales_table(), "sales").await.unwrap();

        let err = storage
            .insert_dataset(&wide_table(10), "sales")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NameConflict(ref n) if n == "sales"));

        // The first write survives the refused one.
        assert_eq!(storage.load_dataset("sales").await.unwrap().table, sales_table());
    }
}

#[tokio::test]
async fn test_prefix_names_are_independent() {
    for (storage, _guard) in backends().await {
        storage.add_to_database(&sales_table(), "sales").await.unwrap();
        storage.add_to_database(&wide_table(5), "sales_2024").await.unwrap();

        assert!(storage.remove_dataset("sales").await);

        let names = storage.list_datasets().await.unwrap();
        assert!(names.contains("sales_2024"));
        assert_eq!(storage.load_dataset("sales_2024").await.unwrap().table.num_rows(), 5);
    }
}

#[tokio::test]
async fn test_dataset_info() {
    for (storage, _guard) in backends().await {
        storage.add_to_database(&wide_table(14), "wide").await.unwrap();

        let info = storage.dataset_info("wide").await.unwrap();
        assert_eq!(info.name, "wide");
        assert_eq!(info.rows, 14);
        assert_eq!(info.columns.len(), 2);
        assert_eq!(info.columns[1].null_count, 2);
    }
}

#[tokio::test]
async fn test_concurrent_readers_share_handle() {
    for (storage, _guard) in backends().await {
        storage.add_to_database(&sales_table(), "sales").await.unwrap();

        let readers: Vec<_> = (0..8)
            .map(|_| {
                let storage = Arc::clone(&storage);
                tokio::spawn(async move { storage.load_dataset("sales").await })
            })
            .collect();

        for reader in readers {
            let dataset = reader.await.unwrap().unwrap();
            assert_eq!(dataset.table, sales_table());
        }
    }
}

#[tokio::test]
async fn test_factory_selects_file_backend_from_config() {
    let dir = TempDir::new().unwrap();
    let config = coral_datasets::Config::from_lookup(|name| match name {
        "DATASETS_PATH" => Some(dir.path().to_string_lossy().into_owned()),
        _ => None,
    })
    .unwrap();

    let storage = StorageFactory::from_config(&config.storage).await.unwrap();
    assert_eq!(storage.backend_name(), "file");

    storage.add_to_database(&sales_table(), "sales").await.unwrap();
    assert!(dir.path().join("sales.arrow").is_file());
}
