use std::fs;

use etl::error::ErrorKind;
use etl::export::export_csv;
use etl::ingest::ingest_csv;
use etl::pipeline::Pipeline;
use etl::test_utils::operational::{operational_rates, test_source_config};
use etl_config::shared::{AnalyticalConfig, PipelineConfig};
use etl_telemetry::tracing::init_test_tracing;
use tempfile::TempDir;

const RATES_CSV: &str = "date,rate\n\
                         2025-06-01,6.80\n\
                         2025-06-02,6.90\n\
                         2025-06-03,n/a\n\
                         2025-06-07,7.00\n";

#[tokio::test(flavor = "multi_thread")]
async fn ingest_skips_invalid_rows_and_keeps_existing_dates() {
    init_test_tracing();

    let dir = TempDir::new().unwrap();
    let csv_path = dir.path().join("rates.csv");
    fs::write(&csv_path, RATES_CSV).unwrap();
    let source = test_source_config(dir.path());

    let first = ingest_csv(&csv_path, &source).await.unwrap();

    assert_eq!(first.rows_read, 4);
    assert_eq!(first.inserted, 3);
    assert_eq!(first.skipped, 1);

    fs::write(&csv_path, "date,rate\n2025-06-01,9.99\n2025-06-04,6.70\n").unwrap();
    let second = ingest_csv(&csv_path, &source).await.unwrap();

    assert_eq!(second.inserted, 1);
    assert_eq!(second.already_present, 1);
    assert_eq!(
        operational_rates(&source).await.unwrap(),
        vec![
            ("2025-06-01".to_string(), 6.80),
            ("2025-06-02".to_string(), 6.90),
            ("2025-06-04".to_string(), 6.70),
            ("2025-06-07".to_string(), 7.00),
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_csv_file_is_unavailable() {
    init_test_tracing();

    let dir = TempDir::new().unwrap();
    let source = test_source_config(dir.path());

    let err = ingest_csv(&dir.path().join("missing.csv"), &source)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
    assert!(err.detail().unwrap().contains("missing.csv"));
    assert!(!source.path.exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn ingest_run_and_export_end_to_end() {
    init_test_tracing();

    let dir = TempDir::new().unwrap();
    let csv_path = dir.path().join("rates.csv");
    fs::write(&csv_path, RATES_CSV).unwrap();
    let config = PipelineConfig {
        source: test_source_config(dir.path()),
        analytical: AnalyticalConfig {
            path: Some(dir.path().join("analytical.duckdb")),
            ..AnalyticalConfig::default()
        },
    };

    ingest_csv(&csv_path, &config.source).await.unwrap();
    let mut pipeline = Pipeline::from_config(&config).unwrap();
    let summary = pipeline.run().await.unwrap();

    let export_path = dir.path().join("report.csv");
    let report = export_csv(pipeline.store(), pipeline.tables(), &export_path)
        .await
        .unwrap();

    assert_eq!(report.rows.len(), 3);
    let average = report.average_adjusted_rate.unwrap();
    assert!((average - summary.average_adjusted_rate.unwrap()).abs() < 1e-9);
    assert!((report.average_original_rate.unwrap() - 20.7 / 3.0).abs() < 1e-9);

    let exported = fs::read_to_string(&export_path).unwrap();
    let lines: Vec<&str> = exported.lines().collect();
    assert_eq!(
        lines[..4],
        [
            "date,original_rate,adjusted_rate",
            "2025-06-01,6.8,3.4",
            "2025-06-02,6.9,6.9",
            "2025-06-07,7,3.5",
        ]
    );

    assert_eq!(lines.len(), 6);
    let original_average: f64 = lines[4]
        .strip_prefix("average_original_rate,")
        .and_then(|rest| rest.strip_suffix(','))
        .unwrap()
        .parse()
        .unwrap();
    assert!((original_average - 20.7 / 3.0).abs() < 1e-9, "{original_average}");
    let adjusted_average: f64 = lines[5]
        .strip_prefix("average_adjusted_rate,,")
        .unwrap()
        .parse()
        .unwrap();
    assert!((adjusted_average - 4.6).abs() < 1e-9, "{adjusted_average}");
}
