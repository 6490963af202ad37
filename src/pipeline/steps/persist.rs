use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::{PipelineStep, StageOutput};
use crate::app::ports::RecordRepository;
use crate::common::constants::STAGE_PERSIST;
use crate::common::error::Result;
use crate::domain::EnrichedRecord;
use crate::pipeline::profile::TestProfile;
use crate::pipeline::storage::{ArtifactRef, ArtifactStore};

/// Hands the enriched table to the repository and stores the
/// identifier-augmented copy it returns.
pub struct PersistStep {
    repository: Arc<dyn RecordRepository>,
    store: ArtifactStore,
}

impl PersistStep {
    pub fn new(repository: Arc<dyn RecordRepository>, store: ArtifactStore) -> Self {
        Self { repository, store }
    }
}

#[async_trait]
impl PipelineStep for PersistStep {
    type Input = ArtifactRef;

    async fn execute(&self, profile: &TestProfile, artifact: ArtifactRef) -> Result<StageOutput> {
        let table: Vec<EnrichedRecord> = self.store.read_table(&artifact)?;
        let persisted = self.repository.insert_records(table).await?;

        let output = self
            .store
            .write_table(&profile.artifact_prefix(STAGE_PERSIST), &persisted)?;
        info!(
            test = %profile.test_type,
            rows = persisted.len(),
            artifact = %output,
            "Saved data to repository"
        );
        Ok(StageOutput { artifact: output, rows: persisted.len() })
    }

    fn step_name(&self) -> &'static str {
        STAGE_PERSIST
    }
}
