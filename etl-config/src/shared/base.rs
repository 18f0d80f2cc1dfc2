use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The analytical store connection pool cannot be empty.
    #[error("`analytical.pool_size` cannot be zero")]
    PoolSizeZero,
    /// A table name is empty or is not a plain SQL identifier.
    #[error("`{field}` must be a plain identifier matching [A-Za-z_][A-Za-z0-9_]* (received: `{value}`)")]
    InvalidTableName { field: &'static str, value: String },
    /// Two analytical artifacts were configured with the same name.
    #[error("`{first}` and `{second}` cannot share the table name `{name}`")]
    DuplicateTableName {
        first: &'static str,
        second: &'static str,
        name: String,
    },
}

/// Returns `true` when `name` can be used unquoted as a table identifier.
pub(crate) fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }

    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
