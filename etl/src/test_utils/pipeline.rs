use etl_config::shared::TableNames;

use crate::error::EtlResult;
use crate::pipeline::Pipeline;
use crate::source::memory::MemorySource;
use crate::store::AnalyticalStore;
use crate::types::RawRateRecord;

/// Creates a pipeline over an in-memory source and a single-connection in-memory store.
///
/// A pool of one keeps every stage on the same DuckDB connection, which lets tests observe
/// temporary tables left behind by a run. The returned source shares its records with the
/// pipeline, so tests can change the snapshot between runs.
pub fn create_memory_pipeline(
    records: Vec<RawRateRecord>,
) -> EtlResult<(Pipeline<MemorySource>, MemorySource)> {
    let store = AnalyticalStore::new_in_memory(1)?;
    let source = MemorySource::new(records);

    Ok((
        Pipeline::new(TableNames::default(), source.clone(), store),
        source,
    ))
}

