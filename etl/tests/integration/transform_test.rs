use chrono::NaiveDate;
use etl::aggregate::{define_view, read_average};
use etl::error::ErrorKind;
use etl::store::AnalyticalStore;
use etl::test_utils::analytical::{has_table, seed_target_table};
use etl::transform::{read_report, run_transform};
use etl::types::ReportRow;
use etl_config::shared::TableNames;
use etl_telemetry::tracing::init_test_tracing;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn weekend_rows_are_halved_in_the_report() {
    init_test_tracing();

    let store = AnalyticalStore::new_in_memory(2).unwrap();
    let tables = TableNames::default();
    seed_target_table(
        &store,
        &tables.target,
        &[("2025-06-07", 7.00), ("2025-06-02", 6.90)],
    )
    .await
    .unwrap();

    let rows = run_transform(&store, &tables).await.unwrap();

    assert_eq!(rows, 2);
    assert_eq!(
        read_report(&store, &tables).await.unwrap(),
        vec![
            ReportRow {
                date: date(2025, 6, 2),
                original_rate: 6.90,
                adjusted_rate: 6.90,
            },
            ReportRow {
                date: date(2025, 6, 7),
                original_rate: 7.00,
                adjusted_rate: 3.50,
            },
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn aggregate_view_averages_adjusted_rates() {
    init_test_tracing();

    let store = AnalyticalStore::new_in_memory(2).unwrap();
    let tables = TableNames::default();
    seed_target_table(
        &store,
        &tables.target,
        &[("2025-06-02", 6.90), ("2025-06-06", 7.00), ("2025-06-07", 7.00)],
    )
    .await
    .unwrap();

    run_transform(&store, &tables).await.unwrap();
    define_view(&store, &tables).await.unwrap();

    let adjusted: Vec<f64> = read_report(&store, &tables)
        .await
        .unwrap()
        .iter()
        .map(|row| row.adjusted_rate)
        .collect();
    assert_eq!(adjusted, vec![6.90, 7.00, 3.50]);

    let average = read_average(&store, &tables).await.unwrap().unwrap();
    assert!((average - 5.80).abs() < 1e-9, "{average}");
}

#[tokio::test(flavor = "multi_thread")]
async fn transform_without_target_writes_no_report() {
    init_test_tracing();

    let store = AnalyticalStore::new_in_memory(2).unwrap();
    let tables = TableNames::default();

    let err = run_transform(&store, &tables).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DependencyMissing);
    assert!(err.detail().unwrap().contains(&tables.target));
    assert!(!has_table(&store, &tables.report).await.unwrap());
}

#[tokio::test(flavor = "multi_thread")]
async fn rerun_leaves_no_stale_report_rows() {
    init_test_tracing();

    let store = AnalyticalStore::new_in_memory(2).unwrap();
    let tables = TableNames::default();
    seed_target_table(&store, &tables.target, &[("2025-06-07", 7.00)])
        .await
        .unwrap();
    run_transform(&store, &tables).await.unwrap();

    // Overwrite the stored rate directly, then derive the report again.
    store
        .run({
            let target = tables.target.clone();
            move |conn| {
                conn.execute_batch(&format!(
                    "UPDATE \"{target}\" SET rate = 8.00 WHERE date = DATE '2025-06-07';"
                ))?;
                Ok(())
            }
        })
        .await
        .unwrap();
    run_transform(&store, &tables).await.unwrap();

    assert_eq!(
        read_report(&store, &tables).await.unwrap(),
        vec![ReportRow {
            date: date(2025, 6, 7),
            original_rate: 8.00,
            adjusted_rate: 4.00,
        }]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn reading_a_missing_report_is_a_dependency_error() {
    init_test_tracing();

    let store = AnalyticalStore::new_in_memory(1).unwrap();
    let tables = TableNames::default();

    let err = read_report(&store, &tables).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DependencyMissing);
    assert!(err.detail().unwrap().contains(&tables.report));
}
