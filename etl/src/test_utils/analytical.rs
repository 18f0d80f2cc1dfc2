use duckdb::{Connection, params};

use crate::error::EtlResult;
use crate::merge::ensure_target_table;
use crate::store::{AnalyticalStore, query_failure, table_exists, write_failure};
use crate::transform::read_target_ordered;
use crate::types::RateRecord;

/// Returns the rows of `target` ordered by date.
pub async fn target_rows(store: &AnalyticalStore, target: &str) -> EtlResult<Vec<RateRecord>> {
    let target = target.to_string();

    store
        .run(move |conn| read_target_ordered(conn, &target))
        .await
}

/// Returns `true` when a persistent table named `name` exists.
pub async fn has_table(store: &AnalyticalStore, name: &str) -> EtlResult<bool> {
    let name = name.to_string();

    store.run(move |conn| table_exists(conn, &name)).await
}

/// Returns the names of the temporary tables visible on a pooled connection.
///
/// Temporary tables are connection-local, so with a pool larger than one this only sees
/// the connection it happens to check out.
pub async fn temporary_tables(store: &AnalyticalStore) -> EtlResult<Vec<String>> {
    store.run(list_temporary_tables).await
}

fn list_temporary_tables(conn: &Connection) -> EtlResult<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT table_name FROM duckdb_tables() WHERE temporary ORDER BY table_name")
        .map_err(query_failure("DuckDB temporary table lookup failed", "duckdb_tables"))?;

    let names = stmt
        .query_map(params![], |row| row.get::<_, String>(0))
        .map_err(query_failure("DuckDB temporary table lookup failed", "duckdb_tables"))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(query_failure("DuckDB temporary table lookup failed", "duckdb_tables"))?;

    Ok(names)
}

/// Creates `target` if needed and inserts `rows` without going through a merge.
pub async fn seed_target_table(
    store: &AnalyticalStore,
    target: &str,
    rows: &[(&str, f64)],
) -> EtlResult<()> {
    let target = target.to_string();
    let rows: Vec<(String, f64)> = rows
        .iter()
        .map(|(date, rate)| (date.to_string(), *rate))
        .collect();

    store
        .run(move |conn| {
            ensure_target_table(conn, &target)?;

            for (date, rate) in &rows {
                conn.execute(
                    &format!("INSERT INTO \"{target}\" (date, rate) VALUES (CAST(? AS DATE), ?)"),
                    params![date, *rate],
                )
                .map_err(write_failure("DuckDB target seeding failed", &target))?;
            }

            Ok(())
        })
        .await
}

/// Creates `target` without the unique key on `date` and inserts `rows`.
///
/// Upserts into such a table cannot resolve their conflict target and fail.
pub async fn create_unkeyed_target_table(
    store: &AnalyticalStore,
    target: &str,
    rows: &[(&str, f64)],
) -> EtlResult<()> {
    let target = target.to_string();
    let rows: Vec<(String, f64)> = rows
        .iter()
        .map(|(date, rate)| (date.to_string(), *rate))
        .collect();

    store
        .run(move |conn| {
            conn.execute_batch(&format!("CREATE TABLE \"{target}\" (date DATE, rate DOUBLE);"))
                .map_err(write_failure("DuckDB unkeyed target creation failed", &target))?;

            for (date, rate) in &rows {
                conn.execute(
                    &format!("INSERT INTO \"{target}\" (date, rate) VALUES (CAST(? AS DATE), ?)"),
                    params![date, *rate],
                )
                .map_err(write_failure("DuckDB target seeding failed", &target))?;
            }

            Ok(())
        })
        .await
}
