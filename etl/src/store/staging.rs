//! Run-scoped staging of raw snapshot records.
//!
//! Staging keeps both columns as text. It only transports records into the analytical store
//! and performs no validation, which is left to the merge engine.

use std::fmt;

use duckdb::{Connection, params};
use duckdb::types::Value;
use tracing::{debug, info, warn};

use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;
use crate::store::{AnalyticalStore, DuckDbConnection, query_failure, run_blocking};
use crate::types::{RawRateRecord, StagedRow};

/// A connection-local `TEMP` staging table.
///
/// The guard owns the pooled connection the table was created on, since `TEMP` tables are
/// only visible to that connection. The table is dropped by [`StagingTable::release`] or,
/// failing that, when the guard is dropped.
pub struct StagingTable {
    conn: Option<DuckDbConnection>,
    name: String,
    rows: usize,
}

impl StagingTable {
    /// Creates (or recreates) an empty staging table named `name` on `conn`.
    pub fn create(conn: DuckDbConnection, name: &str) -> EtlResult<Self> {
        conn.execute_batch(&format!(
            "CREATE OR REPLACE TEMP TABLE \"{name}\" (seq BIGINT, date_str VARCHAR, rate_str VARCHAR);"
        ))
        .map_err(|e| {
            etl_error!(
                ErrorKind::DestinationQueryFailed,
                "DuckDB staging table creation failed",
                table = name,
                source: e
            )
        })?;

        debug!(table = name, "created staging table");

        Ok(Self {
            conn: Some(conn),
            name: name.to_string(),
            rows: 0,
        })
    }

    /// Returns the staging table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of rows loaded so far.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Returns the connection owning the staging table.
    pub fn connection(&self) -> EtlResult<&Connection> {
        self.conn.as_deref().ok_or_else(|| {
            etl_error!(
                ErrorKind::Unknown,
                "Staging table was already released",
                table = self.name
            )
        })
    }

    /// Bulk-loads `records` with the DuckDB Appender.
    ///
    /// `seq` numbers continue from the rows already loaded and start at 1.
    pub fn append(&mut self, records: &[RawRateRecord]) -> EtlResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let start = self.rows;
        {
            let conn = self.connection()?;
            let mut appender = conn.appender(&self.name).map_err(|e| {
                etl_error!(
                    ErrorKind::DestinationQueryFailed,
                    "DuckDB staging appender creation failed",
                    table = self.name,
                    source: e
                )
            })?;

            for (offset, record) in records.iter().enumerate() {
                let seq = (start + offset + 1) as i64;
                let values = [
                    Value::BigInt(seq),
                    text_or_null(record.date.clone()),
                    text_or_null(record.rate.to_staging_text()),
                ];

                appender
                    .append_row(duckdb::appender_params_from_iter(&values))
                    .map_err(|e| {
                        etl_error!(
                            ErrorKind::DestinationQueryFailed,
                            "DuckDB staging append_row failed",
                            format!("row {seq} of `{}`", self.name),
                            source: e
                        )
                    })?;
            }

            appender.flush().map_err(|e| {
                etl_error!(
                    ErrorKind::DestinationQueryFailed,
                    "DuckDB staging appender flush failed",
                    table = self.name,
                    source: e
                )
            })?;
        }

        self.rows += records.len();

        Ok(())
    }

    /// Reads every staged row in snapshot order.
    pub fn read_rows(&self) -> EtlResult<Vec<StagedRow>> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT seq, date_str, rate_str FROM \"{}\" ORDER BY seq",
                self.name
            ))
            .map_err(query_failure("DuckDB staging read failed", &self.name))?;

        let rows = stmt
            .query_map(params![], |row| {
                Ok(StagedRow {
                    seq: row.get(0)?,
                    date: row.get(1)?,
                    rate: row.get(2)?,
                })
            })
            .map_err(query_failure("DuckDB staging read failed", &self.name))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(query_failure("DuckDB staging row decoding failed", &self.name))?;

        Ok(rows)
    }

    /// Drops the staging table and returns its connection to the pool.
    pub fn release(mut self) -> EtlResult<()> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };

        conn.execute_batch(&drop_statement(&self.name)).map_err(|e| {
            etl_error!(
                ErrorKind::DestinationQueryFailed,
                "DuckDB staging table drop failed",
                self.name.clone(),
                source: e
            )
        })?;

        debug!(table = %self.name, "released staging table");

        Ok(())
    }
}

impl fmt::Debug for StagingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagingTable")
            .field("name", &self.name)
            .field("rows", &self.rows)
            .field("released", &self.conn.is_none())
            .finish()
    }
}

impl Drop for StagingTable {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            match conn.execute_batch(&drop_statement(&self.name)) {
                Ok(()) => debug!(table = %self.name, "dropped staging table"),
                Err(e) => warn!(table = %self.name, error = %e, "failed to drop staging table"),
            }
        }
    }
}

fn drop_statement(name: &str) -> String {
    format!("DROP TABLE IF EXISTS \"{name}\"")
}

fn text_or_null(text: Option<String>) -> Value {
    text.map(Value::Text).unwrap_or(Value::Null)
}

/// Loads a full snapshot into a fresh staging table named `name`.
///
/// The load is all-or-nothing: if any row fails, the partially filled table is dropped and
/// the error returned.
pub async fn load_staging(
    store: &AnalyticalStore,
    name: &str,
    records: Vec<RawRateRecord>,
) -> EtlResult<StagingTable> {
    let store = store.clone();
    let name = name.to_string();

    let staging = run_blocking(move || {
        let mut staging = StagingTable::create(store.connection()?, &name)?;
        staging.append(&records)?;

        Ok(staging)
    })
    .await?;

    info!(table = %staging.name(), rows = staging.rows(), "loaded staging table");

    Ok(staging)
}
