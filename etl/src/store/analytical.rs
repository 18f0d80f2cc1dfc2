use std::fmt;
use std::path::Path;

use duckdb::{Connection, DuckdbConnectionManager};
use etl_config::shared::AnalyticalConfig;
use r2d2::{Pool, PooledConnection};
use tracing::{debug, warn};

use crate::error::{ErrorKind, EtlError, EtlResult};
use crate::etl_error;

/// A DuckDB connection checked out of the analytical store pool.
pub type DuckDbConnection = PooledConnection<DuckdbConnectionManager>;

/// Embedded DuckDB analytical store.
///
/// An [`r2d2`] connection pool hands connections to `spawn_blocking` tasks, which keeps
/// DuckDB's synchronous API off the async runtime. Cloning is cheap and clones share the
/// pool.
#[derive(Clone)]
pub struct AnalyticalStore {
    pool: Pool<DuckdbConnectionManager>,
}

impl AnalyticalStore {
    /// Opens the store described by `config`, in memory when no path is configured.
    pub fn open(config: &AnalyticalConfig) -> EtlResult<Self> {
        match &config.path {
            Some(path) => Self::new(path, config.pool_size),
            None => Self::new_in_memory(config.pool_size),
        }
    }

    /// Opens a store backed by a file at `path`.
    ///
    /// The file is created if it does not exist.
    pub fn new(path: impl AsRef<Path>, pool_size: u32) -> EtlResult<Self> {
        let path = path.as_ref();
        let manager = DuckdbConnectionManager::file(path).map_err(|e| {
            etl_error!(
                ErrorKind::DestinationConnectionFailed,
                "Failed to create DuckDB connection manager",
                path.display(),
                source: e
            )
        })?;

        Self::from_manager(manager, pool_size)
    }

    /// Opens a store backed by an in-memory database.
    ///
    /// All pooled connections share the same database, which is destroyed once the pool
    /// is dropped.
    pub fn new_in_memory(pool_size: u32) -> EtlResult<Self> {
        let manager = DuckdbConnectionManager::memory().map_err(|e| {
            etl_error!(
                ErrorKind::DestinationConnectionFailed,
                "Failed to create in-memory DuckDB connection manager",
                source: e
            )
        })?;

        Self::from_manager(manager, pool_size)
    }

    fn from_manager(manager: DuckdbConnectionManager, pool_size: u32) -> EtlResult<Self> {
        let pool = Pool::builder().max_size(pool_size).build(manager).map_err(|e| {
            etl_error!(
                ErrorKind::DestinationConnectionFailed,
                "Failed to build DuckDB connection pool",
                source: e
            )
        })?;

        Ok(Self { pool })
    }

    /// Checks a connection out of the pool.
    pub fn connection(&self) -> EtlResult<DuckDbConnection> {
        self.pool.get().map_err(|e| {
            etl_error!(
                ErrorKind::DestinationConnectionFailed,
                "Failed to get DuckDB connection from pool",
                source: e
            )
        })
    }

    /// Runs `f` on a pooled connection inside a blocking task.
    pub async fn run<T, F>(&self, f: F) -> EtlResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> EtlResult<T> + Send + 'static,
    {
        let store = self.clone();

        run_blocking(move || {
            let conn = store.connection()?;
            f(&*conn)
        })
        .await
    }
}

impl fmt::Debug for AnalyticalStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyticalStore")
            .field("pool", &self.pool.state())
            .finish()
    }
}

/// Runs blocking DuckDB work on the blocking thread pool.
pub(crate) async fn run_blocking<T, F>(f: F) -> EtlResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> EtlResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|_| etl_error!(ErrorKind::BlockingTaskPanic, "DuckDB blocking task panicked"))?
}

/// Returns `true` when a persistent (non-temporary) table named `name` exists.
pub fn table_exists(conn: &Connection, name: &str) -> EtlResult<bool> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM duckdb_tables() WHERE table_name = ? AND NOT temporary",
            [name],
            |row| row.get(0),
        )
        .map_err(|e| {
            etl_error!(
                ErrorKind::DestinationQueryFailed,
                "Failed to look up DuckDB table",
                name,
                source: e
            )
        })?;

    Ok(count > 0)
}

/// Runs `f` inside one `BEGIN TRANSACTION … COMMIT` block.
///
/// Any error returned by `f` rolls the transaction back and is returned unchanged. A
/// rejected `COMMIT` is rolled back and reported as [`ErrorKind::WriteFailure`].
pub fn with_transaction<T, F>(conn: &Connection, what: &'static str, f: F) -> EtlResult<T>
where
    F: FnOnce(&Connection) -> EtlResult<T>,
{
    conn.execute_batch("BEGIN TRANSACTION").map_err(|e| {
        etl_error!(
            ErrorKind::WriteFailure,
            "DuckDB BEGIN TRANSACTION failed",
            what,
            source: e
        )
    })?;

    let result = f(conn);

    match result {
        Ok(value) => match conn.execute_batch("COMMIT") {
            Ok(()) => {
                debug!(what, "committed transaction");
                Ok(value)
            }
            Err(e) => {
                rollback(conn, what);
                Err(etl_error!(
                    ErrorKind::WriteFailure,
                    "DuckDB COMMIT failed",
                    what,
                    source: e
                ))
            }
        },
        Err(err) => {
            rollback(conn, what);
            Err(err)
        }
    }
}

fn rollback(conn: &Connection, what: &'static str) {
    if let Err(e) = conn.execute_batch("ROLLBACK") {
        warn!(what, error = %e, "DuckDB ROLLBACK failed");
    } else {
        debug!(what, "rolled back transaction");
    }
}

/// Wraps a failed write statement as [`ErrorKind::WriteFailure`] naming `table`.
pub(crate) fn write_failure<'a>(
    description: &'static str,
    table: &'a str,
) -> impl FnOnce(duckdb::Error) -> EtlError + 'a {
    move |e| etl_error!(ErrorKind::WriteFailure, description, table = table, source: e)
}

/// Wraps a failed read statement as [`ErrorKind::DestinationQueryFailed`] naming `table`.
pub(crate) fn query_failure<'a>(
    description: &'static str,
    table: &'a str,
) -> impl FnOnce(duckdb::Error) -> EtlError + 'a {
    move |e| etl_error!(ErrorKind::DestinationQueryFailed, description, table = table, source: e)
}
