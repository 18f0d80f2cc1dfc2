use std::fmt;

use chrono::NaiveDate;

/// A rate value as found in the operational store.
///
/// The operational store does not enforce column types, so a rate may arrive as a number,
/// as text, or not at all.
#[derive(Debug, Clone, PartialEq)]
pub enum RawRate {
    Number(f64),
    Text(String),
    Missing,
}

impl RawRate {
    /// Returns the textual transport form used by the staging table.
    ///
    /// Numbers are rendered with the shortest representation that parses back to the same
    /// value, so staging never loses precision.
    pub fn to_staging_text(&self) -> Option<String> {
        match self {
            RawRate::Number(value) => Some(value.to_string()),
            RawRate::Text(text) => Some(text.clone()),
            RawRate::Missing => None,
        }
    }
}

impl From<f64> for RawRate {
    fn from(value: f64) -> Self {
        RawRate::Number(value)
    }
}

impl From<&str> for RawRate {
    fn from(value: &str) -> Self {
        RawRate::Text(value.to_string())
    }
}

/// One `(date, rate)` record read from the operational store, not yet validated.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRateRecord {
    pub date: Option<String>,
    pub rate: RawRate,
}

impl RawRateRecord {
    pub fn new(date: impl Into<String>, rate: impl Into<RawRate>) -> Self {
        Self {
            date: Some(date.into()),
            rate: rate.into(),
        }
    }
}

/// A row read back from the staging table.
///
/// `seq` is the 1-based position of the record in the source snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedRow {
    pub seq: i64,
    pub date: Option<String>,
    pub rate: Option<String>,
}

impl fmt::Display for StagedRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "staged row {} (date: {}, rate: {})",
            self.seq,
            self.date.as_deref().unwrap_or("NULL"),
            self.rate.as_deref().unwrap_or("NULL")
        )
    }
}

/// A validated rate record, ready to be merged into the target table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateRecord {
    pub date: NaiveDate,
    pub rate: f64,
}
