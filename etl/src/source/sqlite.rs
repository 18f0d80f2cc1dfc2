use etl_config::shared::SourceConfig;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection, Row};
use tracing::{debug, info};

use crate::bail;
use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;
use crate::source::SnapshotSource;
use crate::types::{RawRate, RawRateRecord};

/// Snapshot source backed by an SQLite operational store.
///
/// The database is opened read-only and is never created. Every read opens a fresh
/// connection and closes it once the snapshot is collected.
#[derive(Debug, Clone)]
pub struct SqliteSource {
    config: SourceConfig,
}

impl SqliteSource {
    pub fn new(config: SourceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    async fn connect(&self) -> EtlResult<SqliteConnection> {
        let path = &self.config.path;

        if !path.is_file() {
            bail!(
                ErrorKind::SourceUnavailable,
                "Operational store does not exist",
                path.display()
            );
        }

        SqliteConnectOptions::new()
            .filename(path)
            .read_only(true)
            .create_if_missing(false)
            .connect()
            .await
            .map_err(|e| {
                etl_error!(
                    ErrorKind::SourceUnavailable,
                    "Failed to open operational store",
                    path.display(),
                    source: e
                )
            })
    }

    async fn ensure_table_exists(&self, conn: &mut SqliteConnection) -> EtlResult<()> {
        // SQLite opens any file lazily, so a file that is not a database first fails here.
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?",
        )
        .bind(&self.config.table)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| {
            etl_error!(
                ErrorKind::SourceUnavailable,
                "Operational store cannot be read",
                self.config.path.display(),
                source: e
            )
        })?;

        if count == 0 {
            bail!(
                ErrorKind::SourceUnavailable,
                "Operational table does not exist",
                format!(
                    "table `{}` in `{}`",
                    self.config.table,
                    self.config.path.display()
                )
            );
        }

        Ok(())
    }

    async fn fetch_records(&self, conn: &mut SqliteConnection) -> EtlResult<Vec<RawRateRecord>> {
        // SQLite does not enforce column types, so numbers and text are split apart here
        // and the rate keeps whichever representation it was stored with.
        let query = format!(
            "SELECT CAST(date AS TEXT) AS date, \
             CASE WHEN typeof(rate) IN ('real', 'integer') THEN CAST(rate AS REAL) END AS rate_number, \
             CASE WHEN typeof(rate) = 'text' THEN rate END AS rate_text \
             FROM \"{}\" ORDER BY rowid",
            self.config.table
        );

        let rows = sqlx::query(&query).fetch_all(&mut *conn).await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let date: Option<String> = row.try_get("date")?;
            let rate_number: Option<f64> = row.try_get("rate_number")?;
            let rate_text: Option<String> = row.try_get("rate_text")?;

            let rate = match (rate_number, rate_text) {
                (Some(number), _) => RawRate::Number(number),
                (None, Some(text)) => RawRate::Text(text),
                (None, None) => RawRate::Missing,
            };

            debug!(?date, ?rate, "read operational record");
            records.push(RawRateRecord { date, rate });
        }

        Ok(records)
    }
}

impl SnapshotSource for SqliteSource {
    fn name() -> &'static str {
        "sqlite"
    }

    async fn read_snapshot(&self) -> EtlResult<Vec<RawRateRecord>> {
        let mut conn = self.connect().await?;

        self.ensure_table_exists(&mut conn).await?;
        let records = self.fetch_records(&mut conn).await?;

        conn.close().await?;

        info!(
            path = %self.config.path.display(),
            table = %self.config.table,
            rows = records.len(),
            "read snapshot from operational store"
        );

        Ok(records)
    }
}
