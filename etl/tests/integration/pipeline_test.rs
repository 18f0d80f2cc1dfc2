use etl::error::ErrorKind;
use etl::pipeline::{Pipeline, PipelineStage};
use etl::test_utils::analytical::{has_table, target_rows, temporary_tables};
use etl::test_utils::operational::{seed_operational_store, test_source_config};
use etl::test_utils::pipeline::create_memory_pipeline;
use etl::transform::read_report;
use etl::types::RawRateRecord;
use etl_config::shared::{AnalyticalConfig, PipelineConfig, TableNames};
use etl_telemetry::tracing::init_test_tracing;
use tempfile::TempDir;

fn june_snapshot() -> Vec<RawRateRecord> {
    vec![
        RawRateRecord::new("2025-06-02", 6.90),
        RawRateRecord::new("2025-06-06", "7.00"),
        RawRateRecord::new("2025-06-07", 7.00),
    ]
}

#[tokio::test(flavor = "multi_thread")]
async fn run_materializes_target_report_and_view() {
    init_test_tracing();

    let (mut pipeline, _source) = create_memory_pipeline(june_snapshot()).unwrap();

    let summary = pipeline.run().await.unwrap();

    assert_eq!(pipeline.stage(), PipelineStage::Done);
    assert_eq!(summary.source_rows, 3);
    assert_eq!(summary.staged_rows, 3);
    assert_eq!(summary.merge.inserted, 3);
    assert_eq!(summary.report_rows, 3);
    assert!((summary.average_adjusted_rate.unwrap() - 5.80).abs() < 1e-9);
    assert!(temporary_tables(pipeline.store()).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn second_run_with_same_snapshot_changes_nothing() {
    init_test_tracing();

    let (mut pipeline, _source) = create_memory_pipeline(june_snapshot()).unwrap();
    let tables = pipeline.tables().clone();

    pipeline.run().await.unwrap();
    let target_before = target_rows(pipeline.store(), &tables.target).await.unwrap();
    let report_before = read_report(pipeline.store(), &tables).await.unwrap();

    let summary = pipeline.run().await.unwrap();

    assert!(summary.merge.is_noop());
    assert_eq!(
        target_rows(pipeline.store(), &tables.target).await.unwrap(),
        target_before
    );
    assert_eq!(
        read_report(pipeline.store(), &tables).await.unwrap(),
        report_before
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn changed_snapshot_updates_target_and_report() {
    init_test_tracing();

    let (mut pipeline, source) =
        create_memory_pipeline(vec![RawRateRecord::new("2025-06-01", 6.80)]).unwrap();
    let tables = pipeline.tables().clone();
    pipeline.run().await.unwrap();

    source
        .replace(vec![
            RawRateRecord::new("2025-06-01", 6.95),
            RawRateRecord::new("2025-06-02", 6.90),
        ])
        .await;
    let summary = pipeline.run().await.unwrap();

    assert_eq!(summary.merge.updated, 1);
    assert_eq!(summary.merge.inserted, 1);

    let report = read_report(pipeline.store(), &tables).await.unwrap();
    assert_eq!(report.len(), 2);
    // 2025-06-01 is a Sunday.
    assert_eq!(report[0].original_rate, 6.95);
    assert_eq!(report[0].adjusted_rate, 6.95 / 2.0);
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_row_fails_the_run_before_any_write() {
    init_test_tracing();

    let (mut pipeline, source) = create_memory_pipeline(june_snapshot()).unwrap();
    let tables = pipeline.tables().clone();
    pipeline.run().await.unwrap();
    let target_before = target_rows(pipeline.store(), &tables.target).await.unwrap();

    source
        .push(RawRateRecord::new("2025-13-01", 7.25))
        .await;
    let err = pipeline.run().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::CoercionFailure);
    assert_eq!(pipeline.stage(), PipelineStage::Failed);
    assert!(err.detail().unwrap().contains("2025-13-01"));
    assert_eq!(
        target_rows(pipeline.store(), &tables.target).await.unwrap(),
        target_before
    );
    assert!(temporary_tables(pipeline.store()).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn out_of_range_year_is_rejected_and_later_runs_recover() {
    init_test_tracing();

    let (mut pipeline, source) = create_memory_pipeline(june_snapshot()).unwrap();
    let tables = pipeline.tables().clone();
    pipeline.run().await.unwrap();
    let target_before = target_rows(pipeline.store(), &tables.target).await.unwrap();

    for bad_date in ["+12345-01-01", "-0001-06-07"] {
        source.push(RawRateRecord::new(bad_date, 7.25)).await;
        let err = pipeline.run().await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::CoercionFailure);
        assert_eq!(pipeline.stage(), PipelineStage::Failed);
        assert!(err.detail().unwrap().contains(bad_date));
        assert_eq!(
            target_rows(pipeline.store(), &tables.target).await.unwrap(),
            target_before
        );

        source.replace(june_snapshot()).await;
    }

    source
        .push(RawRateRecord::new("2025-06-09", 7.10))
        .await;
    let summary = pipeline.run().await.unwrap();

    assert_eq!(pipeline.stage(), PipelineStage::Done);
    assert_eq!(summary.merge.inserted, 1);
    assert_eq!(summary.report_rows, 4);
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_snapshot_produces_empty_report_and_no_average() {
    init_test_tracing();

    let (mut pipeline, _source) = create_memory_pipeline(Vec::new()).unwrap();

    let summary = pipeline.run().await.unwrap();

    assert_eq!(summary.report_rows, 0);
    assert_eq!(summary.average_adjusted_rate, None);
    assert!(
        has_table(pipeline.store(), &pipeline.tables().target)
            .await
            .unwrap()
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn pipeline_from_config_reads_operational_store_into_duckdb_file() {
    init_test_tracing();

    let dir = TempDir::new().unwrap();
    let source = test_source_config(dir.path());
    seed_operational_store(&source, &june_snapshot()).await.unwrap();

    let config = PipelineConfig {
        source,
        analytical: AnalyticalConfig {
            path: Some(dir.path().join("analytical.duckdb")),
            ..AnalyticalConfig::default()
        },
    };

    let mut pipeline = Pipeline::from_config(&config).unwrap();
    let summary = pipeline.run().await.unwrap();

    assert_eq!(summary.merge.inserted, 3);
    assert!(dir.path().join("analytical.duckdb").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_operational_store_fails_at_source_read() {
    init_test_tracing();

    let dir = TempDir::new().unwrap();
    let config = PipelineConfig {
        source: test_source_config(dir.path()),
        analytical: AnalyticalConfig::default(),
    };

    let mut pipeline = Pipeline::from_config(&config).unwrap();
    let err = pipeline.run().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
    assert_eq!(pipeline.stage(), PipelineStage::Failed);
    assert!(
        !has_table(pipeline.store(), &config.analytical.tables.target)
            .await
            .unwrap()
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_table_names_are_rejected() {
    init_test_tracing();

    let dir = TempDir::new().unwrap();
    let config = PipelineConfig {
        source: test_source_config(dir.path()),
        analytical: AnalyticalConfig {
            tables: TableNames {
                report: "mortgage_rates".to_string(),
                ..TableNames::default()
            },
            ..AnalyticalConfig::default()
        },
    };

    let err = Pipeline::from_config(&config).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConfigError);
}
