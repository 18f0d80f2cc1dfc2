//! Logging setup shared by the snapshot binary and the test suites.

pub mod tracing;
