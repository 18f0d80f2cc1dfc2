//! Shared configuration types for snapshot pipelines.

mod analytical;
mod base;
mod pipeline;
mod source;

pub use analytical::{AnalyticalConfig, TableNames};
pub use base::ValidationError;
pub use pipeline::PipelineConfig;
pub use source::SourceConfig;
