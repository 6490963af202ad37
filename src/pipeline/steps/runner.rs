use std::sync::Arc;
use std::time::Instant;
use tracing::{error, instrument};

use super::{AnalyzeStep, CleanInput, CleanStep, PersistStep, PipelineStep, StageJob, StageOutput, StageTask};
use crate::app::ports::{RecordRepository, TableSource};
use crate::common::error::Result;
use crate::observability::metrics;
use crate::pipeline::profile::ProfileRegistry;
use crate::pipeline::storage::ArtifactStore;

/// Executes a `StageJob` in-process. Used directly by the inline dispatcher
/// and by queue workers.
pub struct StageRunner {
    registry: Arc<ProfileRegistry>,
    clean: CleanStep,
    persist: PersistStep,
    analyze: AnalyzeStep,
}

impl StageRunner {
    pub fn new(
        registry: Arc<ProfileRegistry>,
        store: ArtifactStore,
        source: Arc<dyn TableSource>,
        repository: Arc<dyn RecordRepository>,
    ) -> Self {
        Self {
            registry,
            clean: CleanStep::new(source, store.clone()),
            persist: PersistStep::new(repository, store.clone()),
            analyze: AnalyzeStep::new(store),
        }
    }

    pub fn registry(&self) -> &Arc<ProfileRegistry> {
        &self.registry
    }

    #[instrument(skip(self, job), fields(test = %job.test_type, stage = job.stage_name()))]
    pub async fn run(&self, job: StageJob) -> Result<StageOutput> {
        let stage = job.stage_name();
        let profile = self.registry.get(job.test_type)?;
        metrics::stage::started(stage);
        let started = Instant::now();

        let result = match job.task {
            StageTask::Clean { data_file_path, config_file_path } => {
                self.clean
                    .execute(profile, CleanInput { data_file_path, config_file_path })
                    .await
            }
            StageTask::Persist { artifact } => self.persist.execute(profile, artifact).await,
            StageTask::Analyze { artifact, filter_by } => {
                self.analyze.execute(profile, (artifact, filter_by)).await
            }
        };

        match &result {
            Ok(_) => metrics::stage::completed(stage, started.elapsed().as_secs_f64()),
            Err(e) => {
                error!(error = %e, "Stage {} failed", stage);
                metrics::stage::failed(stage);
            }
        }
        result
    }
}
