use std::path::Path;

use etl_config::shared::PipelineConfig;
use etl_config::{Environment, load_config, load_config_from_dir};

use crate::error::{SnapshotError, SnapshotResult};

/// Loads and validates the pipeline configuration.
///
/// Reads `./configuration` unless `directory` is given.
pub fn load_pipeline_config(directory: Option<&Path>) -> SnapshotResult<PipelineConfig> {
    let config = match directory {
        Some(directory) => {
            let environment = Environment::load().map_err(SnapshotError::config)?;
            load_config_from_dir::<PipelineConfig>(directory, environment)
        }
        None => load_config::<PipelineConfig>(),
    }
    .map_err(SnapshotError::config)?;

    config.validate().map_err(SnapshotError::config)?;

    Ok(config)
}
