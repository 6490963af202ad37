use async_trait::async_trait;
use tracing::info;

use super::{PipelineStep, StageOutput};
use crate::common::constants::STAGE_ANALYZE;
use crate::common::error::Result;
use crate::domain::{FilterBy, PersistedRecord};
use crate::pipeline::profile::TestProfile;
use crate::pipeline::storage::{ArtifactRef, ArtifactStore};

/// Runs the profile's analysis plugin and stores its sheet-keyed report.
pub struct AnalyzeStep {
    store: ArtifactStore,
}

impl AnalyzeStep {
    pub fn new(store: ArtifactStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl PipelineStep for AnalyzeStep {
    type Input = (ArtifactRef, FilterBy);

    async fn execute(&self, profile: &TestProfile, input: (ArtifactRef, FilterBy)) -> Result<StageOutput> {
        let (artifact, filter_by) = input;
        let table: Vec<PersistedRecord> = self.store.read_table(&artifact)?;
        let report = profile.analysis.execute(&table, filter_by)?;

        let output = self
            .store
            .write_document(&profile.artifact_prefix("report"), &report)?;
        info!(
            test = %profile.test_type,
            analysis = profile.analysis.name(),
            filter_by = filter_by.as_str(),
            sheets = report.sheets.len(),
            artifact = %output,
            "Ran analysis"
        );
        Ok(StageOutput { artifact: output, rows: report.sheets.len() })
    }

    fn step_name(&self) -> &'static str {
        STAGE_ANALYZE
    }
}
