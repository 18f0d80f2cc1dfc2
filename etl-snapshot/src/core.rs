use std::path::Path;

use etl::aggregate::read_average;
use etl::export::export_csv;
use etl::ingest::ingest_csv;
use etl::pipeline::Pipeline;
use etl::store::AnalyticalStore;
use etl::transform::read_report;
use etl_config::shared::PipelineConfig;
use tracing::{debug, info};

use crate::error::SnapshotResult;

/// Runs the snapshot pipeline once.
pub async fn run_pipeline(config: PipelineConfig) -> SnapshotResult<()> {
    info!("starting snapshot pipeline");
    log_config(&config);

    let mut pipeline = Pipeline::from_config(&config)?;
    let summary = pipeline.run().await?;

    info!(
        stage = %pipeline.stage(),
        source_rows = summary.source_rows,
        staged_rows = summary.staged_rows,
        inserted = summary.merge.inserted,
        updated = summary.merge.updated,
        unchanged = summary.merge.unchanged,
        duplicates = summary.merge.duplicates,
        report_rows = summary.report_rows,
        average_adjusted_rate = ?summary.average_adjusted_rate,
        "snapshot pipeline completed"
    );

    Ok(())
}

/// Loads a rates CSV into the operational store.
pub async fn ingest(config: PipelineConfig, csv_path: &Path) -> SnapshotResult<()> {
    log_config(&config);

    let summary = ingest_csv(csv_path, &config.source).await?;

    println!(
        "read {} rows: {} inserted, {} already present, {} skipped",
        summary.rows_read, summary.inserted, summary.already_present, summary.skipped
    );

    Ok(())
}

/// Prints the reporting table and the aggregate view, optionally exporting the base table.
pub async fn report(config: PipelineConfig, output: Option<&Path>) -> SnapshotResult<()> {
    log_config(&config);

    let tables = &config.analytical.tables;
    let store = AnalyticalStore::open(&config.analytical)?;

    let rows = read_report(&store, tables).await?;
    let average = read_average(&store, tables).await?;

    println!("date,original_rate,adjusted_rate");
    for row in &rows {
        println!("{},{},{}", row.date, row.original_rate, row.adjusted_rate);
    }
    match average {
        Some(average) => println!("average adjusted rate: {average}"),
        None => println!("average adjusted rate: n/a"),
    }

    if let Some(output) = output {
        let export = export_csv(&store, tables, output).await?;
        println!(
            "exported {} rows to {}",
            export.rows.len(),
            output.display()
        );
    }

    Ok(())
}

fn log_config(config: &PipelineConfig) {
    debug!(
        path = %config.source.path.display(),
        table = %config.source.table,
        "using operational store config"
    );

    let analytical = &config.analytical;
    debug!(
        path = ?analytical.path,
        pool_size = analytical.pool_size,
        target = %analytical.tables.target,
        staging = %analytical.tables.staging,
        report = %analytical.tables.report,
        aggregate_view = %analytical.tables.aggregate_view,
        "using analytical store config"
    );
}
