//! Testing utilities for snapshot pipelines.
//!
//! - [`operational`] seeds SQLite operational stores with typed or malformed records.
//! - [`analytical`] inspects the tables a run leaves in the analytical store.
//! - [`pipeline`] builds pipelines over in-memory sources and stores.
pub mod analytical;
pub mod operational;
pub mod pipeline;
