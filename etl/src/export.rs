//! CSV export of the base rates table.
//!
//! The export recomputes the adjusted rate of every exported row and appends two labelled
//! averages over the exported rows: one of the original rates, which is what a spreadsheet
//! consumer of the base table computes, and one of the adjusted rates, which matches the
//! aggregate view.
//! Recomputation goes through [`crate::transform::adjusted_rate`] so the export and the
//! reporting table always agree on the weekend rule.

use std::io::Write;
use std::path::Path;

use etl_config::shared::TableNames;
use tracing::info;

use crate::bail;
use crate::conversions::date::DATE_FORMAT;
use crate::error::{ErrorKind, EtlResult};
use crate::store::{AnalyticalStore, run_blocking, table_exists};
use crate::transform::{derive_report_row, read_target_ordered};
use crate::types::{RateRecord, Report};

/// Header of the exported CSV.
const HEADER: [&str; 3] = ["date", "original_rate", "adjusted_rate"];

/// Label of the trailing line holding the mean of the `original_rate` column.
const AVERAGE_ORIGINAL_LABEL: &str = "average_original_rate";

/// Label of the trailing line holding the mean of the `adjusted_rate` column.
const AVERAGE_ADJUSTED_LABEL: &str = "average_adjusted_rate";

fn mean(values: impl ExactSizeIterator<Item = f64>) -> Option<f64> {
    let count = values.len();
    (count > 0).then(|| values.sum::<f64>() / count as f64)
}

/// Builds the export rows and their averages from base records.
pub fn build_export(records: Vec<RateRecord>) -> Report {
    let rows: Vec<_> = records.into_iter().map(derive_report_row).collect();

    Report {
        average_original_rate: mean(rows.iter().map(|row| row.original_rate)),
        average_adjusted_rate: mean(rows.iter().map(|row| row.adjusted_rate)),
        rows,
    }
}

fn format_average(average: Option<f64>) -> String {
    average.map(|average| average.to_string()).unwrap_or_default()
}

/// Reads the base target table ordered by date and builds its export.
pub async fn read_export(store: &AnalyticalStore, tables: &TableNames) -> EtlResult<Report> {
    let target = tables.target.clone();

    let records = store
        .run(move |conn| {
            if !table_exists(conn, &target)? {
                bail!(
                    ErrorKind::DependencyMissing,
                    "Export source table does not exist",
                    table = target
                );
            }

            read_target_ordered(conn, &target)
        })
        .await?;

    Ok(build_export(records))
}

/// Writes `report` as CSV to `writer`.
pub fn write_csv<W: Write>(report: &Report, writer: W) -> EtlResult<()> {
    let mut writer = csv::Writer::from_writer(writer);

    writer.write_record(HEADER)?;
    for row in &report.rows {
        writer.write_record([
            row.date.format(DATE_FORMAT).to_string(),
            row.original_rate.to_string(),
            row.adjusted_rate.to_string(),
        ])?;
    }

    // Each average sits under the column it summarizes.
    writer.write_record([
        AVERAGE_ORIGINAL_LABEL,
        format_average(report.average_original_rate).as_str(),
        "",
    ])?;
    writer.write_record([
        AVERAGE_ADJUSTED_LABEL,
        "",
        format_average(report.average_adjusted_rate).as_str(),
    ])?;

    writer.flush()?;

    Ok(())
}

/// Exports the base target table to a CSV file at `path`.
pub async fn export_csv(
    store: &AnalyticalStore,
    tables: &TableNames,
    path: &Path,
) -> EtlResult<Report> {
    let report = read_export(store, tables).await?;

    let file_path = path.to_path_buf();
    let written = report.clone();
    run_blocking(move || {
        let file = std::fs::File::create(&file_path)?;
        write_csv(&written, file)
    })
    .await?;

    info!(
        path = %path.display(),
        rows = report.rows.len(),
        average_original = ?report.average_original_rate,
        average_adjusted = ?report.average_adjusted_rate,
        "exported rates report"
    );

    Ok(report)
}
