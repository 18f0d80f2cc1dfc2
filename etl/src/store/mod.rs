//! Analytical store access.
//!
//! Wraps a pooled embedded DuckDB database, the run-scoped staging table and the
//! transaction helper used by every stage that writes.

mod analytical;
pub mod staging;

pub use analytical::{AnalyticalStore, DuckDbConnection, table_exists, with_transaction};
pub(crate) use analytical::{query_failure, run_blocking, write_failure};
