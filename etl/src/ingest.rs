//! CSV ingestion into the operational store.
//!
//! Loads `date,rate` rows into the operational rates table. Rows that cannot be used are
//! skipped and reported rather than failing the whole file, and dates that are already
//! present keep their stored rate.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{Position, StringRecord};
use etl_config::shared::SourceConfig;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Connection};
use tracing::{info, warn};

use crate::bail;
use crate::conversions::rate::parse_rate;
use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;

/// A CSV row that was not ingested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    /// 1-based line number in the CSV file, header included.
    pub line: u64,
    pub reason: String,
}

/// The usable rows of a rates CSV file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedRates {
    pub rows: Vec<(String, f64)>,
    pub skipped: Vec<SkippedRow>,
}

/// Outcome of one CSV ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IngestSummary {
    /// Data rows found in the CSV file.
    pub rows_read: usize,
    /// Rows written to the operational table.
    pub inserted: usize,
    /// Valid rows whose date was already present.
    pub already_present: usize,
    /// Rows skipped because a field was missing or the rate was not a number.
    pub skipped: usize,
}

/// Parses a rates CSV with `date` and `rate` headers.
pub fn parse_rates<R: Read>(reader: R) -> EtlResult<ParsedRates> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let date_idx = column_index(&headers, "date");
    let rate_idx = column_index(&headers, "rate");

    let mut parsed = ParsedRates::default();

    // Records carry the line they start on. The fallback only covers errors without one.
    let mut last_line = headers.position().map_or(1, Position::line);

    for result in reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                last_line = e.position().map_or(last_line + 1, Position::line);
                parsed.skipped.push(SkippedRow {
                    line: last_line,
                    reason: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        let line = record.position().map_or(last_line + 1, Position::line);
        last_line = line;

        let field = |idx: Option<usize>| {
            idx.and_then(|idx| record.get(idx))
                .filter(|value| !value.is_empty())
        };

        let (Some(date), Some(rate)) = (field(date_idx), field(rate_idx)) else {
            parsed.skipped.push(SkippedRow {
                line,
                reason: "missing `date` or `rate` field".to_string(),
            });
            continue;
        };

        match parse_rate(rate) {
            Ok(rate) => parsed.rows.push((date.to_string(), rate)),
            Err(_) => parsed.skipped.push(SkippedRow {
                line,
                reason: format!("invalid rate `{rate}`"),
            }),
        }
    }

    Ok(parsed)
}

fn column_index(headers: &StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|header| header.eq_ignore_ascii_case(name))
}

/// Loads `csv_path` into the operational table described by `source`.
///
/// The operational database and table are created when missing. A missing CSV file is a
/// [`ErrorKind::SourceUnavailable`] error.
pub async fn ingest_csv(csv_path: &Path, source: &SourceConfig) -> EtlResult<IngestSummary> {
    if !csv_path.is_file() {
        bail!(
            ErrorKind::SourceUnavailable,
            "CSV file does not exist",
            csv_path.display()
        );
    }

    let file = File::open(csv_path).map_err(|e| {
        etl_error!(
            ErrorKind::SourceUnavailable,
            "Failed to open CSV file",
            csv_path.display(),
            source: e
        )
    })?;
    let parsed = parse_rates(file)?;

    for skipped in &parsed.skipped {
        warn!(line = skipped.line, reason = %skipped.reason, "skipping CSV row");
    }

    let inserted = write_rates(source, &parsed.rows).await?;
    let summary = IngestSummary {
        rows_read: parsed.rows.len() + parsed.skipped.len(),
        inserted,
        already_present: parsed.rows.len() - inserted,
        skipped: parsed.skipped.len(),
    };

    info!(
        csv = %csv_path.display(),
        table = %source.table,
        rows_read = summary.rows_read,
        inserted = summary.inserted,
        already_present = summary.already_present,
        skipped = summary.skipped,
        "ingested rates CSV"
    );

    Ok(summary)
}

async fn write_rates(config: &SourceConfig, rows: &[(String, f64)]) -> EtlResult<usize> {
    let mut conn = SqliteConnectOptions::new()
        .filename(&config.path)
        .create_if_missing(true)
        .connect()
        .await
        .map_err(|e| {
            etl_error!(
                ErrorKind::SourceUnavailable,
                "Failed to open operational store",
                config.path.display(),
                source: e
            )
        })?;

    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS \"{}\" (\
         id INTEGER PRIMARY KEY AUTOINCREMENT, \
         date TEXT UNIQUE NOT NULL, \
         rate REAL NOT NULL)",
        config.table
    ))
    .execute(&mut conn)
    .await?;

    let insert = format!(
        "INSERT INTO \"{}\" (date, rate) VALUES (?, ?) ON CONFLICT(date) DO NOTHING",
        config.table
    );

    let mut tx = conn.begin().await?;
    let mut inserted = 0;
    for (date, rate) in rows {
        let result = sqlx::query(&insert)
            .bind(date.as_str())
            .bind(*rate)
            .execute(&mut *tx)
            .await?;
        inserted += result.rows_affected() as usize;
    }
    tx.commit().await?;

    conn.close().await?;

    Ok(inserted)
}
