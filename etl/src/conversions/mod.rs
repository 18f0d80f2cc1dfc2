//! Conversions from loosely-typed staging values into typed values.

pub mod date;
pub mod rate;
