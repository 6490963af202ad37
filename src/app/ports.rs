use async_trait::async_trait;
use std::path::Path;
use uuid::Uuid;

use crate::analysis::AnalysisReport;
use crate::common::error::{
    AnalysisError, PipelineError, QueueError, RepositoryError, SourceError,
};
use crate::domain::{EnrichedTable, FilterBy, PersistedRecord, RawSample, Workbook};
use crate::pipeline::state::ProgressState;
use crate::pipeline::steps::{JobId, StageJob, StageOutput};

/// Loads the submitted capture table and configuration workbook.
#[async_trait]
pub trait TableSource: Send + Sync {
    async fn load_samples(&self, path: &Path) -> Result<Vec<RawSample>, SourceError>;
    async fn load_workbook(&self, path: &Path) -> Result<Workbook, SourceError>;
}

/// Data repository for enriched rows.
#[async_trait]
pub trait RecordRepository: Send + Sync {
    /// Persist `records` and return them with their assigned identifiers,
    /// in input order.
    async fn insert_records(&self, records: EnrichedTable) -> Result<Vec<PersistedRecord>, RepositoryError>;

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<PersistedRecord>, RepositoryError>;

    async fn count(&self) -> Result<usize, RepositoryError>;
}

/// One test type's analysis over the persisted table.
pub trait AnalysisPlugin: Send + Sync {
    fn name(&self) -> &str;

    fn execute(&self, table: &[PersistedRecord], filter_by: FilterBy) -> Result<AnalysisReport, AnalysisError>;
}

/// Distributed worker queue. Also the channel progress is published on.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// True when a worker answers.
    async fn ping(&self) -> bool;

    async fn submit(&self, job: StageJob) -> Result<JobId, QueueError>;

    /// Block until the job finishes. An enrichment failure on the worker
    /// comes back as `PipelineError::Enrich`, any other failure as
    /// `PipelineError::JobFailed`.
    async fn wait(&self, job: &JobId) -> Result<StageOutput, PipelineError>;

    async fn publish_state(&self, task_id: &str, state: ProgressState);

    async fn state(&self, task_id: &str) -> Option<ProgressState>;
}

/// Receives progress pushed by the orchestrator.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn publish(&self, task_id: &str, state: ProgressState);
}
