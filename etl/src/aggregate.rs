//! Aggregate view over the reporting table.
//!
//! The view is declared once per run and never materialized. Every read recomputes the
//! average against the current reporting table.

use duckdb::{Connection, params};
use etl_config::shared::TableNames;
use tracing::info;

use crate::bail;
use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;
use crate::store::{AnalyticalStore, table_exists, write_failure};

/// Declares (or redeclares) the aggregate view over the reporting table.
pub async fn define_view(store: &AnalyticalStore, tables: &TableNames) -> EtlResult<()> {
    let tables = tables.clone();

    store
        .run(move |conn| create_view(conn, &tables.report, &tables.aggregate_view))
        .await?;

    info!("defined aggregate view");

    Ok(())
}

/// Declares `view` as the mean adjusted rate of `report` on `conn`.
pub fn create_view(conn: &Connection, report: &str, view: &str) -> EtlResult<()> {
    if !table_exists(conn, report)? {
        bail!(
            ErrorKind::DependencyMissing,
            "Aggregate view source table does not exist",
            format!("source table `{report}` is missing, view `{view}` was not defined")
        );
    }

    conn.execute_batch(&format!(
        "CREATE OR REPLACE VIEW \"{view}\" AS \
         SELECT AVG(adjusted_rate) AS average_adjusted_rate FROM \"{report}\";"
    ))
    .map_err(write_failure("DuckDB view creation failed", view))
}

/// Reads the current value of the aggregate view.
///
/// Returns `None` when the reporting table is empty.
pub async fn read_average(store: &AnalyticalStore, tables: &TableNames) -> EtlResult<Option<f64>> {
    let view = tables.aggregate_view.clone();

    store.run(move |conn| query_average(conn, &view)).await
}

/// Reads the current value of `view` on `conn`.
pub fn query_average(conn: &Connection, view: &str) -> EtlResult<Option<f64>> {
    conn.query_row(
        &format!("SELECT average_adjusted_rate FROM \"{view}\""),
        params![],
        |row| row.get::<_, Option<f64>>(0),
    )
    .map_err(|e| {
        etl_error!(
            ErrorKind::DependencyMissing,
            "Aggregate view cannot be read",
            format!("view `{view}`"),
            source: e
        )
    })
}
