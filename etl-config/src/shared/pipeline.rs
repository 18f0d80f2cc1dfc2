use serde::{Deserialize, Serialize};

use crate::shared::{AnalyticalConfig, SourceConfig, ValidationError};

/// Configuration for one snapshot pipeline.
///
/// Holds everything a run needs: where the operational snapshot lives and which
/// analytical store and table names the run writes to.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PipelineConfig {
    /// The operational store the snapshot is read from.
    pub source: SourceConfig,
    /// The analytical store the snapshot is merged into.
    #[serde(default)]
    pub analytical: AnalyticalConfig,
}

impl PipelineConfig {
    /// Validates pipeline configuration settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.source.validate()?;
        self.analytical.validate()
    }
}
