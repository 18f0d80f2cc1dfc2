//! Merge engine: upserts a staged snapshot into the target table.
//!
//! Merging runs in two phases. Every staged row is first coerced into a typed
//! [`RateRecord`], failing closed on the first row that cannot be converted. Only then is the
//! target table touched, inside a single transaction, so a failed merge never leaves a
//! partial upsert behind.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use duckdb::types::Value;
use duckdb::{Connection, params};
use tracing::{debug, info, warn};

use crate::conversions::date::{date_from_value, date_to_value, parse_date};
use crate::conversions::rate::parse_rate;
use crate::error::{ErrorKind, EtlError, EtlResult};
use crate::etl_error;
use crate::store::staging::StagingTable;
use crate::store::{query_failure, run_blocking, with_transaction, write_failure};
use crate::types::{RateRecord, StagedRow};

/// Outcome of merging one snapshot into the target table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Keys that were absent from the target table.
    pub inserted: usize,
    /// Keys whose stored rate was overwritten with a different value.
    pub updated: usize,
    /// Keys whose stored rate already matched the snapshot.
    pub unchanged: usize,
    /// Staged rows superseded by a later row with the same date.
    pub duplicates: usize,
}

impl MergeSummary {
    /// Returns `true` when the merge wrote nothing to the target table.
    pub fn is_noop(&self) -> bool {
        self.inserted == 0 && self.updated == 0
    }
}

/// Merges the contents of `staging` into `target` and releases the staging table.
///
/// The staging table is released on every path. A merge failure takes precedence over a
/// failure to drop the staging table.
pub async fn merge_staged(staging: StagingTable, target: &str) -> EtlResult<MergeSummary> {
    let target = target.to_string();

    let summary = run_blocking(move || {
        let result = staging
            .read_rows()
            .and_then(|rows| merge_rows(staging.connection()?, &rows, &target));

        let released = staging.release();

        match (result, released) {
            (Ok(summary), Ok(())) => Ok(summary),
            (Ok(_), Err(err)) => Err(err),
            (Err(err), released) => {
                if let Err(release_err) = released {
                    warn!(error = %release_err, "failed to release staging table after merge failure");
                }
                Err(err)
            }
        }
    })
    .await?;

    info!(
        inserted = summary.inserted,
        updated = summary.updated,
        unchanged = summary.unchanged,
        duplicates = summary.duplicates,
        "merged snapshot into target table"
    );

    Ok(summary)
}

/// Validates `rows` and upserts them into `target` on `conn`.
pub fn merge_rows(conn: &Connection, rows: &[StagedRow], target: &str) -> EtlResult<MergeSummary> {
    let records = coerce_rows(rows)?;
    let (snapshot, duplicates) = deduplicate(records);

    with_transaction(conn, "merge", |conn| {
        ensure_target_table(conn, target)?;

        let existing = read_target(conn, target)?;
        let mut summary = MergeSummary {
            duplicates,
            ..MergeSummary::default()
        };

        let mut stmt = conn
            .prepare(&format!(
                "INSERT INTO \"{target}\" (date, rate) VALUES (?, ?) \
                 ON CONFLICT (date) DO UPDATE SET rate = excluded.rate"
            ))
            .map_err(write_failure("DuckDB upsert preparation failed", target))?;

        for (date, rate) in snapshot {
            match existing.get(&date) {
                Some(Some(stored)) if stored.to_bits() == rate.to_bits() => {
                    summary.unchanged += 1;
                    continue;
                }
                Some(_) => summary.updated += 1,
                None => summary.inserted += 1,
            }

            debug!(%date, rate, "upserting rate");
            stmt.execute(params![date_to_value(date), rate])
                .map_err(write_failure("DuckDB upsert failed", target))?;
        }

        Ok(summary)
    })
}

/// Creates the target table when it does not exist yet.
pub fn ensure_target_table(conn: &Connection, target: &str) -> EtlResult<()> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS \"{target}\" (date DATE UNIQUE, rate DOUBLE);"
    ))
    .map_err(write_failure("DuckDB target table creation failed", target))
}

/// Coerces every staged row, failing on the first row that cannot be converted.
pub fn coerce_rows(rows: &[StagedRow]) -> EtlResult<Vec<RateRecord>> {
    rows.iter().map(coerce_row).collect()
}

fn coerce_row(row: &StagedRow) -> EtlResult<RateRecord> {
    let date = row
        .date
        .as_deref()
        .ok_or_else(|| coercion_failure(row, "date is NULL"))?;
    let date = parse_date(date).map_err(|e| coercion_failure(row, "invalid date").with_source(e))?;

    let rate = row
        .rate
        .as_deref()
        .ok_or_else(|| coercion_failure(row, "rate is NULL"))?;
    let rate = parse_rate(rate).map_err(|e| coercion_failure(row, "invalid rate").with_source(e))?;

    Ok(RateRecord { date, rate })
}

fn coercion_failure(row: &StagedRow, reason: &str) -> EtlError {
    etl_error!(
        ErrorKind::CoercionFailure,
        "Staged row cannot be coerced to the target schema",
        format!("{row}: {reason}")
    )
}

/// Collapses records sharing a date, keeping the last one in snapshot order.
///
/// Returns the surviving records ordered by date and the number of superseded records.
pub fn deduplicate(records: Vec<RateRecord>) -> (BTreeMap<NaiveDate, f64>, usize) {
    let mut snapshot = BTreeMap::new();
    let mut duplicates = 0;

    for record in records {
        if let Some(previous) = snapshot.insert(record.date, record.rate) {
            duplicates += 1;
            warn!(
                date = %record.date,
                previous,
                rate = record.rate,
                "duplicate date in snapshot, keeping the later rate"
            );
        }
    }

    (snapshot, duplicates)
}

fn read_target(conn: &Connection, target: &str) -> EtlResult<HashMap<NaiveDate, Option<f64>>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT date, rate FROM \"{target}\" WHERE date IS NOT NULL"
        ))
        .map_err(query_failure("DuckDB target read failed", target))?;

    let rows = stmt
        .query_map(params![], |row| {
            Ok((row.get::<_, Value>(0)?, row.get::<_, Option<f64>>(1)?))
        })
        .map_err(query_failure("DuckDB target read failed", target))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(query_failure("DuckDB target row decoding failed", target))?;

    let mut existing = HashMap::with_capacity(rows.len());
    for (date, rate) in rows {
        existing.insert(date_from_value(date)?, rate);
    }

    Ok(existing)
}
