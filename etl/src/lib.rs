//! Snapshot ELT for mortgage rates.
//!
//! Copies the rates of an operational store into an embedded analytical store, merges them
//! into a deduplicated target table, derives a weekend-adjusted reporting table and declares
//! an aggregate view over it. See [`pipeline::Pipeline`] for the entry point.

mod macros;

pub mod aggregate;
pub mod conversions;
pub mod error;
pub mod export;
pub mod ingest;
pub mod merge;
pub mod pipeline;
pub mod source;
pub mod store;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod transform;
pub mod types;
