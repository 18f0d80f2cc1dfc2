//! Shorthands for building and returning [`crate::error::EtlError`] values.
//!
//! A detail is rendered with `to_string`, so paths, table names and formatted messages are
//! passed as they are. Errors about a DuckDB or SQLite table use `table = name`, which renders
//! the detail as ``table `name` `` everywhere.

/// Builds an [`crate::error::EtlError`] from a kind, a static description, an optional detail
/// and an optional `source:` error.
///
/// ```ignore
/// etl_error!(ErrorKind::WriteFailure, "DuckDB upsert failed", table = target, source: e)
/// ```
#[macro_export]
macro_rules! etl_error {
    ($kind:expr, $desc:expr $(, source: $source:expr)?) => {
        $crate::error::EtlError::from(($kind, $desc)) $(.with_source($source))?
    };
    ($kind:expr, $desc:expr, table = $table:expr $(, source: $source:expr)?) => {
        $crate::etl_error!(
            $kind,
            $desc,
            ::std::format!("table `{}`", $table)
            $(, source: $source)?
        )
    };
    ($kind:expr, $desc:expr, $detail:expr $(, source: $source:expr)?) => {
        $crate::error::EtlError::from(($kind, $desc, $detail.to_string())) $(.with_source($source))?
    };
}

/// Returns early with the [`crate::error::EtlError`] that [`etl_error!`] builds from the same
/// arguments.
#[macro_export]
macro_rules! bail {
    ($($arg:tt)+) => {
        return ::core::result::Result::Err($crate::etl_error!($($arg)+))
    };
}
