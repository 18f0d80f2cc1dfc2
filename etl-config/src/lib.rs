//! Configuration types and loading for snapshot pipelines.

mod environment;
mod load;
pub mod shared;

pub use environment::Environment;
pub use load::{LoadConfigError, load_config, load_config_from_dir};
