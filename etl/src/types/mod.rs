//! Common types used throughout the snapshot pipeline.
//!
//! Records move through three representations: raw records as read from the operational
//! store, staged rows as read back from the loosely-typed staging table, and validated
//! rate records that the merge engine writes.

mod rate;
mod report;

pub use rate::*;
pub use report::*;
