use std::path::Path;

use etl_config::shared::SourceConfig;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Connection};

use crate::error::EtlResult;
use crate::types::{RawRate, RawRateRecord};

/// File name of the operational database created by [`test_source_config`].
pub const TEST_OPERATIONAL_DB: &str = "operational.db";

/// Returns a source config pointing at an operational database inside `dir`.
pub fn test_source_config(dir: &Path) -> SourceConfig {
    SourceConfig::new(dir.join(TEST_OPERATIONAL_DB))
}

/// Creates the operational table described by `config` and inserts `records` in order.
///
/// The `rate` column is declared without a type so that text and `NULL` rates are stored
/// exactly as given, like a loosely typed operational store would hold them.
pub async fn seed_operational_store(
    config: &SourceConfig,
    records: &[RawRateRecord],
) -> EtlResult<()> {
    let mut conn = SqliteConnectOptions::new()
        .filename(&config.path)
        .create_if_missing(true)
        .connect()
        .await?;

    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS \"{}\" (id INTEGER PRIMARY KEY AUTOINCREMENT, date TEXT, rate)",
        config.table
    ))
    .execute(&mut conn)
    .await?;

    let insert = format!("INSERT INTO \"{}\" (date, rate) VALUES (?, ?)", config.table);
    for record in records {
        let query = sqlx::query(&insert).bind(record.date.as_deref());
        let query = match &record.rate {
            RawRate::Number(value) => query.bind(Some(*value)),
            RawRate::Text(text) => query.bind(Some(text.as_str())),
            RawRate::Missing => query.bind(Option::<f64>::None),
        };
        query.execute(&mut conn).await?;
    }

    conn.close().await?;

    Ok(())
}

/// Creates an operational database at `config.path` holding an unrelated table only.
pub async fn seed_database_without_rates(config: &SourceConfig) -> EtlResult<()> {
    let mut conn = SqliteConnectOptions::new()
        .filename(&config.path)
        .create_if_missing(true)
        .connect()
        .await?;

    sqlx::query("CREATE TABLE IF NOT EXISTS unrelated (id INTEGER PRIMARY KEY)")
        .execute(&mut conn)
        .await?;

    conn.close().await?;

    Ok(())
}

/// Reads back the `(date, rate)` pairs of the operational table ordered by date.
pub async fn operational_rates(config: &SourceConfig) -> EtlResult<Vec<(String, f64)>> {
    let mut conn = SqliteConnectOptions::new()
        .filename(&config.path)
        .read_only(true)
        .connect()
        .await?;

    let rows: Vec<(String, f64)> = sqlx::query_as(&format!(
        "SELECT date, rate FROM \"{}\" ORDER BY date",
        config.table
    ))
    .fetch_all(&mut conn)
    .await?;

    conn.close().await?;

    Ok(rows)
}
