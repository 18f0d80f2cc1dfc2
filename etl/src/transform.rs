//! Transform engine: derives the reporting table from the target table.
//!
//! The reporting table is a pure function of the target table. Each run recomputes every row
//! and swaps the table content inside one transaction, so readers see either the previous
//! report or the new one.

use chrono::NaiveDate;
use duckdb::types::Value;
use duckdb::{Connection, params};
use etl_config::shared::TableNames;
use tracing::info;

use crate::bail;
use crate::conversions::date::{date_from_value, date_to_value, is_weekend};
use crate::error::{ErrorKind, EtlResult};
use crate::store::{AnalyticalStore, query_failure, table_exists, with_transaction, write_failure};
use crate::types::{RateRecord, ReportRow};

/// Applies the weekend rule: rates dated on a Saturday or a Sunday are halved.
pub fn adjusted_rate(date: NaiveDate, rate: f64) -> f64 {
    if is_weekend(date) { rate / 2.0 } else { rate }
}

/// Derives the reporting row of a target record.
pub fn derive_report_row(record: RateRecord) -> ReportRow {
    ReportRow {
        date: record.date,
        original_rate: record.rate,
        adjusted_rate: adjusted_rate(record.date, record.rate),
    }
}

/// Recomputes the reporting table from the target table.
///
/// Fails with [`ErrorKind::DependencyMissing`] and writes nothing when the target table does
/// not exist. Returns the number of reporting rows written.
pub async fn run_transform(store: &AnalyticalStore, tables: &TableNames) -> EtlResult<usize> {
    let tables = tables.clone();

    let rows = store
        .run(move |conn| transform(conn, &tables.target, &tables.report))
        .await?;

    info!(rows, "replaced reporting table");

    Ok(rows)
}

/// Recomputes `report` from `target` on `conn`.
pub fn transform(conn: &Connection, target: &str, report: &str) -> EtlResult<usize> {
    ensure_dependency(conn, target, report)?;

    with_transaction(conn, "transform", |conn| {
        let rows: Vec<ReportRow> = read_target_ordered(conn, target)?
            .into_iter()
            .map(derive_report_row)
            .collect();

        write_report(conn, report, &rows)?;

        Ok(rows.len())
    })
}

/// Replaces the content of `report` with `rows`.
///
/// Callers run this inside a transaction so that a failure restores the previous report.
fn write_report(conn: &Connection, report: &str, rows: &[ReportRow]) -> EtlResult<()> {
    conn.execute_batch(&format!(
        "CREATE OR REPLACE TABLE \"{report}\" \
         (date DATE, original_rate DOUBLE, adjusted_rate DOUBLE);"
    ))
    .map_err(write_failure("DuckDB reporting table creation failed", report))?;

    let mut appender = conn
        .appender(report)
        .map_err(write_failure("DuckDB reporting appender creation failed", report))?;

    for row in rows {
        let values = [
            date_to_value(row.date),
            Value::Double(row.original_rate),
            Value::Double(row.adjusted_rate),
        ];

        appender
            .append_row(duckdb::appender_params_from_iter(&values))
            .map_err(write_failure("DuckDB reporting append_row failed", report))?;
    }

    appender
        .flush()
        .map_err(write_failure("DuckDB reporting appender flush failed", report))
}

fn ensure_dependency(conn: &Connection, target: &str, report: &str) -> EtlResult<()> {
    if !table_exists(conn, target)? {
        bail!(
            ErrorKind::DependencyMissing,
            "Transform source table does not exist",
            format!("source table `{target}` is missing, output table `{report}` was not written")
        );
    }

    Ok(())
}

/// Reads the target table ordered by date.
///
/// Rows with a `NULL` date or rate carry no reportable value and are left out.
pub fn read_target_ordered(conn: &Connection, target: &str) -> EtlResult<Vec<RateRecord>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT date, rate FROM \"{target}\" \
             WHERE date IS NOT NULL AND rate IS NOT NULL ORDER BY date"
        ))
        .map_err(query_failure("DuckDB target read failed", target))?;

    let rows = stmt
        .query_map(params![], |row| {
            Ok((row.get::<_, Value>(0)?, row.get::<_, f64>(1)?))
        })
        .map_err(query_failure("DuckDB target read failed", target))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(query_failure("DuckDB target row decoding failed", target))?;

    rows.into_iter()
        .map(|(date, rate)| {
            Ok(RateRecord {
                date: date_from_value(date)?,
                rate,
            })
        })
        .collect()
}

/// Reads the reporting table ordered by date.
pub async fn read_report(store: &AnalyticalStore, tables: &TableNames) -> EtlResult<Vec<ReportRow>> {
    let report = tables.report.clone();

    store
        .run(move |conn| {
            if !table_exists(conn, &report)? {
                bail!(
                    ErrorKind::DependencyMissing,
                    "Reporting table does not exist",
                    table = report
                );
            }

            read_report_rows(conn, &report)
        })
        .await
}

fn read_report_rows(conn: &Connection, report: &str) -> EtlResult<Vec<ReportRow>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT date, original_rate, adjusted_rate FROM \"{report}\" ORDER BY date"
        ))
        .map_err(query_failure("DuckDB reporting read failed", report))?;

    let rows = stmt
        .query_map(params![], |row| {
            Ok((
                row.get::<_, Value>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, f64>(2)?,
            ))
        })
        .map_err(query_failure("DuckDB reporting read failed", report))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(query_failure("DuckDB reporting row decoding failed", report))?;

    rows.into_iter()
        .map(|(date, original_rate, adjusted_rate)| {
            Ok(ReportRow {
                date: date_from_value(date)?,
                original_rate,
                adjusted_rate,
            })
        })
        .collect()
}
