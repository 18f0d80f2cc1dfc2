use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::error::EtlResult;
use crate::source::SnapshotSource;
use crate::types::RawRateRecord;

/// In-memory snapshot source for testing and embedding.
///
/// Clones share the same records, so a test can keep a handle and change the snapshot
/// between two pipeline runs.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    records: Arc<Mutex<Vec<RawRateRecord>>>,
}

impl MemorySource {
    /// Creates a source that returns `records`.
    pub fn new(records: Vec<RawRateRecord>) -> Self {
        Self {
            records: Arc::new(Mutex::new(records)),
        }
    }

    /// Replaces the whole snapshot.
    pub async fn replace(&self, records: Vec<RawRateRecord>) {
        *self.records.lock().await = records;
    }

    /// Appends one record to the snapshot.
    pub async fn push(&self, record: RawRateRecord) {
        self.records.lock().await.push(record);
    }
}

impl SnapshotSource for MemorySource {
    fn name() -> &'static str {
        "memory"
    }

    async fn read_snapshot(&self) -> EtlResult<Vec<RawRateRecord>> {
        let records = self.records.lock().await.clone();

        info!(rows = records.len(), "read snapshot from memory source");

        Ok(records)
    }
}
