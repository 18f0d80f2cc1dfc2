use std::fs;

use etl::error::ErrorKind;
use etl::source::SnapshotSource;
use etl::source::sqlite::SqliteSource;
use etl::test_utils::operational::{
    seed_database_without_rates, seed_operational_store, test_source_config,
};
use etl::types::{RawRate, RawRateRecord};
use etl_telemetry::tracing::init_test_tracing;
use tempfile::TempDir;

#[tokio::test(flavor = "multi_thread")]
async fn reads_records_in_insertion_order_with_their_raw_types() {
    init_test_tracing();

    let dir = TempDir::new().unwrap();
    let config = test_source_config(dir.path());
    seed_operational_store(
        &config,
        &[
            RawRateRecord::new("2025-06-02", 6.90),
            RawRateRecord::new("2025-06-01", "6.80"),
            RawRateRecord {
                date: Some("2025-06-03".to_string()),
                rate: RawRate::Missing,
            },
        ],
    )
    .await
    .unwrap();

    let records = SqliteSource::new(config).read_snapshot().await.unwrap();

    assert_eq!(
        records,
        vec![
            RawRateRecord::new("2025-06-02", 6.90),
            RawRateRecord::new("2025-06-01", "6.80"),
            RawRateRecord {
                date: Some("2025-06-03".to_string()),
                rate: RawRate::Missing,
            },
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_database_file_is_unavailable() {
    init_test_tracing();

    let dir = TempDir::new().unwrap();
    let config = test_source_config(dir.path());

    let err = SqliteSource::new(config.clone())
        .read_snapshot()
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
    assert!(err.detail().unwrap().contains("operational.db"));
    // The reader never creates the operational store.
    assert!(!config.path.exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_table_is_unavailable() {
    init_test_tracing();

    let dir = TempDir::new().unwrap();
    let config = test_source_config(dir.path());
    seed_database_without_rates(&config).await.unwrap();

    let err = SqliteSource::new(config).read_snapshot().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
    assert!(err.detail().unwrap().contains("mortgage_rates"));
}

#[tokio::test(flavor = "multi_thread")]
async fn file_that_is_not_a_database_is_unavailable() {
    init_test_tracing();

    let dir = TempDir::new().unwrap();
    let config = test_source_config(dir.path());
    fs::write(&config.path, "date,rate\n2025-06-01,6.80\n").unwrap();

    let err = SqliteSource::new(config.clone())
        .read_snapshot()
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
    assert!(err.detail().unwrap().contains("operational.db"));
    assert_eq!(
        fs::read_to_string(&config.path).unwrap(),
        "date,rate\n2025-06-01,6.80\n"
    );
}
