use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use super::{PipelineStep, StageOutput};
use crate::app::ports::TableSource;
use crate::common::constants::STAGE_CLEAN;
use crate::common::error::Result;
use crate::observability::metrics;
use crate::pipeline::profile::TestProfile;
use crate::pipeline::storage::ArtifactStore;

#[derive(Debug, Clone, PartialEq)]
pub struct CleanInput {
    pub data_file_path: PathBuf,
    pub config_file_path: PathBuf,
}

/// Loads the raw captures and workbook, runs the profile's cleanup and
/// writes the enriched table to the artifact store.
pub struct CleanStep {
    source: Arc<dyn TableSource>,
    store: ArtifactStore,
}

impl CleanStep {
    pub fn new(source: Arc<dyn TableSource>, store: ArtifactStore) -> Self {
        Self { source, store }
    }
}

#[async_trait]
impl PipelineStep for CleanStep {
    type Input = CleanInput;

    async fn execute(&self, profile: &TestProfile, input: CleanInput) -> Result<StageOutput> {
        let raw = self.source.load_samples(&input.data_file_path).await?;
        let workbook = self.source.load_workbook(&input.config_file_path).await?;

        let (table, summary) = profile.cleanup.clean(raw, &workbook)?;
        metrics::enrich::record_summary(&summary);
        if !summary.unmatched_sequencing.is_empty() {
            warn!(
                test = %profile.test_type,
                unmatched = ?summary.unmatched_sequencing,
                "Sequencing entries matched no captured testpoint"
            );
        }

        let artifact = self
            .store
            .write_table(&profile.artifact_prefix(STAGE_CLEAN), &table)?;
        info!(
            test = %profile.test_type,
            strategy = profile.cleanup.name(),
            rows_in = summary.rows_in,
            rows_out = summary.rows_out,
            artifact = %artifact,
            "Cleaned data"
        );
        Ok(StageOutput { artifact, rows: table.len() })
    }

    fn step_name(&self) -> &'static str {
        STAGE_CLEAN
    }
}
