use std::future::Future;

use crate::error::EtlResult;
use crate::types::RawRateRecord;

/// Trait for operational stores a pipeline can snapshot.
///
/// Implementations return every record currently stored, in a stable order, without
/// validating dates or rates. Validation belongs to the merge engine.
///
/// A source that cannot be reached must fail with
/// [`crate::error::ErrorKind::SourceUnavailable`] and name the missing resource, so the
/// pipeline can abort before anything is written downstream.
pub trait SnapshotSource {
    /// Returns the name of the source.
    fn name() -> &'static str;

    /// Reads the full snapshot of rate records.
    fn read_snapshot(&self) -> impl Future<Output = EtlResult<Vec<RawRateRecord>>> + Send;
}
