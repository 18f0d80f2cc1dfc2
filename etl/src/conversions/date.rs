use chrono::{Datelike, NaiveDate, Weekday};
use duckdb::types::Value;

use crate::bail;
use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;

/// Format of date keys in the operational store.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// `num_days_from_ce` of 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Parses a `YYYY-MM-DD` date, ignoring surrounding whitespace.
///
/// Only unsigned four-digit years from 0001 to 9999 are accepted.
pub fn parse_date(text: &str) -> EtlResult<NaiveDate> {
    let text = text.trim();

    if !is_plain_iso_date(text) {
        bail!(
            ErrorKind::CoercionFailure,
            "Date is not in YYYY-MM-DD form",
            format!("`{text}`")
        );
    }

    let date = NaiveDate::parse_from_str(text, DATE_FORMAT)?;
    if date.year() < 1 {
        bail!(
            ErrorKind::CoercionFailure,
            "Date is before year 0001",
            format!("`{text}`")
        );
    }

    Ok(date)
}

fn is_plain_iso_date(text: &str) -> bool {
    let bytes = text.as_bytes();

    bytes.len() == 10
        && bytes.iter().enumerate().all(|(idx, byte)| match idx {
            4 | 7 => *byte == b'-',
            _ => byte.is_ascii_digit(),
        })
}

/// Returns the number of days between the Unix epoch and `date`.
pub fn days_since_epoch(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

/// Returns the date `days` after the Unix epoch.
pub fn date_from_days(days: i32) -> EtlResult<NaiveDate> {
    days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)
        .and_then(NaiveDate::from_num_days_from_ce_opt)
        .ok_or_else(|| {
            etl_error!(
                ErrorKind::InvalidData,
                "DuckDB date is out of range",
                format!("{days} days since 1970-01-01")
            )
        })
}

/// Converts a DuckDB `DATE` value back into a date.
pub fn date_from_value(value: Value) -> EtlResult<NaiveDate> {
    match value {
        Value::Date32(days) => date_from_days(days),
        other => bail!(
            ErrorKind::InvalidData,
            "DuckDB value is not a DATE",
            format!("{:?}", other.data_type())
        ),
    }
}

/// Converts `date` into a DuckDB `DATE` parameter.
pub fn date_to_value(date: NaiveDate) -> Value {
    Value::Date32(days_since_epoch(date))
}

/// Returns `true` when `date` falls on a Saturday or a Sunday.
pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}
