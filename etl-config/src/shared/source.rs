use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;
use crate::shared::base::is_plain_identifier;

fn default_source_table() -> String {
    SourceConfig::DEFAULT_TABLE.to_string()
}

/// Location of the operational store the snapshot is read from.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceConfig {
    /// Path to the SQLite database file. The reader never creates it.
    pub path: PathBuf,
    /// Table holding `(id, date, rate)` records.
    #[serde(default = "default_source_table")]
    pub table: String,
}

impl SourceConfig {
    /// Default name of the operational rates table.
    pub const DEFAULT_TABLE: &'static str = "mortgage_rates";

    /// Creates a source config for `path` using the default table name.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            table: default_source_table(),
        }
    }

    /// Validates the source table name.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !is_plain_identifier(&self.table) {
            return Err(ValidationError::InvalidTableName {
                field: "source.table",
                value: self.table.clone(),
            });
        }

        Ok(())
    }
}
