use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;
use crate::shared::base::is_plain_identifier;

const fn default_pool_size() -> u32 {
    4
}

/// Names of the tables and views a pipeline owns in the analytical store.
///
/// Every stage receives these names explicitly, so two pipelines pointed at the
/// same analytical store stay isolated as long as their names differ.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TableNames {
    /// Merge target keyed uniquely by date.
    pub target: String,
    /// Run-scoped temporary staging table.
    pub staging: String,
    /// Reporting table fully replaced by every transform run.
    pub report: String,
    /// Read-time aggregate view over the reporting table.
    pub aggregate_view: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            target: "mortgage_rates".to_string(),
            staging: "staging_mortgage_rates".to_string(),
            report: "dbt_mortgage_rates_report".to_string(),
            aggregate_view: "dbt_average_adjusted_rate_view".to_string(),
        }
    }
}

impl TableNames {
    fn fields(&self) -> [(&'static str, &str); 4] {
        [
            ("analytical.tables.target", &self.target),
            ("analytical.tables.staging", &self.staging),
            ("analytical.tables.report", &self.report),
            ("analytical.tables.aggregate_view", &self.aggregate_view),
        ]
    }

    /// Validates that every name is a plain identifier and that names are distinct.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let fields = self.fields();

        for (field, value) in fields {
            if !is_plain_identifier(value) {
                return Err(ValidationError::InvalidTableName {
                    field,
                    value: value.to_string(),
                });
            }
        }

        for (i, (first, name)) in fields.iter().enumerate() {
            for (second, other) in &fields[i + 1..] {
                if name.eq_ignore_ascii_case(other) {
                    return Err(ValidationError::DuplicateTableName {
                        first,
                        second,
                        name: name.to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}

/// Analytical store settings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnalyticalConfig {
    /// DuckDB database file. An in-memory database is used when absent.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Maximum number of pooled DuckDB connections.
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    /// Names of the artifacts written by the pipeline.
    #[serde(default)]
    pub tables: TableNames,
}

impl Default for AnalyticalConfig {
    fn default() -> Self {
        Self {
            path: None,
            pool_size: default_pool_size(),
            tables: TableNames::default(),
        }
    }
}

impl AnalyticalConfig {
    /// Validates pool sizing and table names.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.pool_size == 0 {
            return Err(ValidationError::PoolSizeZero);
        }

        self.tables.validate()
    }
}
