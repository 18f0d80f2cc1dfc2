//! Snapshot sources for pipeline runs.
//!
//! A source produces the full point-in-time sequence of rate records held by an operational
//! store. Reading is side-effect free.

mod base;
pub mod memory;
pub mod sqlite;

pub use base::SnapshotSource;
