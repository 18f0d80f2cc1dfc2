use chrono::NaiveDate;
use etl::error::{ErrorKind, EtlResult};
use etl::merge::{MergeSummary, merge_staged};
use etl::store::AnalyticalStore;
use etl::store::staging::load_staging;
use etl::test_utils::analytical::{
    create_unkeyed_target_table, seed_target_table, target_rows, temporary_tables,
};
use etl::types::{RateRecord, RawRate, RawRateRecord};
use etl_telemetry::tracing::init_test_tracing;

const TARGET: &str = "mortgage_rates";
const STAGING: &str = "staging_mortgage_rates";

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

async fn merge(store: &AnalyticalStore, records: Vec<RawRateRecord>) -> EtlResult<MergeSummary> {
    let staging = load_staging(store, STAGING, records).await?;
    merge_staged(staging, TARGET).await
}

#[tokio::test(flavor = "multi_thread")]
async fn merging_the_same_snapshot_twice_is_idempotent() {
    init_test_tracing();

    let store = AnalyticalStore::new_in_memory(1).unwrap();
    let snapshot = vec![
        RawRateRecord::new("2025-06-01", 6.80),
        RawRateRecord::new("2025-06-02", "6.90"),
        RawRateRecord::new("2025-06-07", 7.00),
    ];

    let first = merge(&store, snapshot.clone()).await.unwrap();
    let after_first = target_rows(&store, TARGET).await.unwrap();

    let second = merge(&store, snapshot).await.unwrap();
    let after_second = target_rows(&store, TARGET).await.unwrap();

    assert_eq!(first.inserted, 3);
    assert!(second.is_noop());
    assert_eq!(second.unchanged, 3);

    assert_eq!(after_first.len(), after_second.len());
    for (a, b) in after_first.iter().zip(&after_second) {
        assert_eq!(a.date, b.date);
        assert_eq!(a.rate.to_bits(), b.rate.to_bits());
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn merge_overwrites_an_existing_key() {
    init_test_tracing();

    let store = AnalyticalStore::new_in_memory(1).unwrap();
    seed_target_table(&store, TARGET, &[("2025-06-01", 6.80)])
        .await
        .unwrap();

    let summary = merge(&store, vec![RawRateRecord::new("2025-06-01", 6.95)])
        .await
        .unwrap();

    assert_eq!(summary.updated, 1);
    assert_eq!(
        target_rows(&store, TARGET).await.unwrap(),
        vec![RateRecord {
            date: date(2025, 6, 1),
            rate: 6.95,
        }]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn merge_inserts_a_new_key_with_coerced_values() {
    init_test_tracing();

    let store = AnalyticalStore::new_in_memory(1).unwrap();
    seed_target_table(&store, TARGET, &[("2025-06-01", 6.80)])
        .await
        .unwrap();

    let summary = merge(
        &store,
        vec![
            RawRateRecord::new("2025-06-01", 6.80),
            RawRateRecord::new(" 2025-06-03 ", " 7.10 "),
        ],
    )
    .await
    .unwrap();

    assert_eq!(summary.inserted, 1);
    assert_eq!(summary.unchanged, 1);
    assert_eq!(
        target_rows(&store, TARGET).await.unwrap(),
        vec![
            RateRecord {
                date: date(2025, 6, 1),
                rate: 6.80,
            },
            RateRecord {
                date: date(2025, 6, 3),
                rate: 7.10,
            },
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_dates_keep_the_last_rate() {
    init_test_tracing();

    let store = AnalyticalStore::new_in_memory(1).unwrap();

    let summary = merge(
        &store,
        vec![
            RawRateRecord::new("2025-06-01", 6.80),
            RawRateRecord::new("2025-06-01", 6.85),
        ],
    )
    .await
    .unwrap();

    assert_eq!(summary.duplicates, 1);
    assert_eq!(summary.inserted, 1);
    assert_eq!(target_rows(&store, TARGET).await.unwrap()[0].rate, 6.85);
}

#[tokio::test(flavor = "multi_thread")]
async fn coercion_failure_leaves_target_untouched_and_drops_staging() {
    init_test_tracing();

    let store = AnalyticalStore::new_in_memory(1).unwrap();
    seed_target_table(&store, TARGET, &[("2025-06-01", 6.80)])
        .await
        .unwrap();

    let err = merge(
        &store,
        vec![
            RawRateRecord::new("2025-06-01", 6.95),
            RawRateRecord::new("2025-06-02", "not-a-rate"),
        ],
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::CoercionFailure);
    let detail = err.detail().unwrap();
    assert!(detail.contains("staged row 2"), "{detail}");
    assert!(detail.contains("not-a-rate"), "{detail}");

    assert_eq!(
        target_rows(&store, TARGET).await.unwrap(),
        vec![RateRecord {
            date: date(2025, 6, 1),
            rate: 6.80,
        }]
    );
    assert!(temporary_tables(&store).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_values_fail_closed() {
    init_test_tracing();

    let store = AnalyticalStore::new_in_memory(1).unwrap();

    let err = merge(
        &store,
        vec![RawRateRecord {
            date: Some("2025-06-01".to_string()),
            rate: RawRate::Missing,
        }],
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::CoercionFailure);
    assert!(err.detail().unwrap().contains("rate is NULL"));
}

#[tokio::test(flavor = "multi_thread")]
async fn staging_is_released_after_a_successful_merge() {
    init_test_tracing();

    let store = AnalyticalStore::new_in_memory(1).unwrap();

    merge(&store, vec![RawRateRecord::new("2025-06-01", 6.80)])
        .await
        .unwrap();

    assert!(temporary_tables(&store).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_upsert_rolls_back_and_releases_staging() {
    init_test_tracing();

    let store = AnalyticalStore::new_in_memory(1).unwrap();
    create_unkeyed_target_table(&store, TARGET, &[("2025-06-01", 6.80)])
        .await
        .unwrap();
    let before = target_rows(&store, TARGET).await.unwrap();

    let err = merge(
        &store,
        vec![
            RawRateRecord::new("2025-06-01", 6.95),
            RawRateRecord::new("2025-06-02", 6.90),
        ],
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::WriteFailure);
    assert!(err.detail().unwrap().contains(TARGET));
    assert_eq!(target_rows(&store, TARGET).await.unwrap(), before);
    assert!(temporary_tables(&store).await.unwrap().is_empty());
}
