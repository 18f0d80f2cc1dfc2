use std::fmt;

use etl_config::shared::{PipelineConfig, TableNames};
use tracing::{error, info};

use crate::aggregate::{define_view, read_average};
use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;
use crate::merge::{MergeSummary, merge_staged};
use crate::source::SnapshotSource;
use crate::source::sqlite::SqliteSource;
use crate::store::AnalyticalStore;
use crate::store::staging::load_staging;
use crate::transform::run_transform;

/// Stages of one pipeline run.
///
/// A run moves strictly forward through the stages. Any failure moves it to
/// [`PipelineStage::Failed`] and no later stage is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Init,
    SourceRead,
    StageLoad,
    Merge,
    Transform,
    ViewDefine,
    Done,
    Failed,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Init => "init",
            PipelineStage::SourceRead => "source_read",
            PipelineStage::StageLoad => "stage_load",
            PipelineStage::Merge => "merge",
            PipelineStage::Transform => "transform",
            PipelineStage::ViewDefine => "view_define",
            PipelineStage::Done => "done",
            PipelineStage::Failed => "failed",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a successful pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Records read from the snapshot source.
    pub source_rows: usize,
    /// Rows loaded into the staging table.
    pub staged_rows: usize,
    pub merge: MergeSummary,
    /// Rows written to the reporting table.
    pub report_rows: usize,
    /// Aggregate view value right after the run.
    pub average_adjusted_rate: Option<f64>,
}

/// Runs snapshots from a source through staging, merge, transform and the aggregate view.
///
/// Runs are strictly sequential and each stage only reads what its predecessor persisted.
/// The pipeline assumes it is the only writer of its tables while a run is in progress.
#[derive(Debug)]
pub struct Pipeline<S> {
    tables: TableNames,
    source: S,
    store: AnalyticalStore,
    stage: PipelineStage,
}

impl Pipeline<SqliteSource> {
    /// Builds a pipeline reading from the SQLite operational store described by `config`.
    pub fn from_config(config: &PipelineConfig) -> EtlResult<Self> {
        config.validate().map_err(|e| {
            etl_error!(
                ErrorKind::ConfigError,
                "Invalid pipeline configuration",
                source: e
            )
        })?;

        let store = AnalyticalStore::open(&config.analytical)?;
        let source = SqliteSource::new(config.source.clone());

        Ok(Self::new(config.analytical.tables.clone(), source, store))
    }
}

impl<S> Pipeline<S>
where
    S: SnapshotSource,
{
    pub fn new(tables: TableNames, source: S, store: AnalyticalStore) -> Self {
        Self {
            tables,
            source,
            store,
            stage: PipelineStage::Init,
        }
    }

    /// Returns the stage the last run reached.
    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub fn tables(&self) -> &TableNames {
        &self.tables
    }

    pub fn store(&self) -> &AnalyticalStore {
        &self.store
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Runs the pipeline once.
    pub async fn run(&mut self) -> EtlResult<RunSummary> {
        self.stage = PipelineStage::Init;
        info!(
            source = S::name(),
            target = %self.tables.target,
            report = %self.tables.report,
            "starting pipeline run"
        );

        match self.run_stages().await {
            Ok(summary) => {
                self.enter(PipelineStage::Done);
                Ok(summary)
            }
            Err(err) => {
                error!(
                    stage = %self.stage,
                    kind = ?err.kind(),
                    detail = err.detail().unwrap_or_default(),
                    "pipeline run failed"
                );
                self.stage = PipelineStage::Failed;
                Err(err)
            }
        }
    }

    async fn run_stages(&mut self) -> EtlResult<RunSummary> {
        self.enter(PipelineStage::SourceRead);
        let records = self.source.read_snapshot().await?;
        let source_rows = records.len();

        self.enter(PipelineStage::StageLoad);
        let staging = load_staging(&self.store, &self.tables.staging, records).await?;
        let staged_rows = staging.rows();

        self.enter(PipelineStage::Merge);
        let merge = merge_staged(staging, &self.tables.target).await?;

        self.enter(PipelineStage::Transform);
        let report_rows = run_transform(&self.store, &self.tables).await?;

        self.enter(PipelineStage::ViewDefine);
        define_view(&self.store, &self.tables).await?;
        let average_adjusted_rate = read_average(&self.store, &self.tables).await?;

        Ok(RunSummary {
            source_rows,
            staged_rows,
            merge,
            report_rows,
            average_adjusted_rate,
        })
    }

    fn enter(&mut self, stage: PipelineStage) {
        info!(from = %self.stage, to = %stage, "pipeline stage transition");
        self.stage = stage;
    }
}
