use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::app::ports::TaskQueue;
use crate::common::constants::{
    PROGRESS_ANALYZING, PROGRESS_CLEANING, PROGRESS_COMPLETE, PROGRESS_PERSISTING, PROGRESS_TOTAL,
};
use crate::common::error::{ArtifactError, PipelineError, Result};
use crate::observability::metrics;
use crate::pipeline::dispatch::{select_dispatcher, Dispatcher, TaskContext};
use crate::pipeline::request::{extract_request_paths, PipelineRequest};
use crate::pipeline::response::{format_response, CompletionResponse};
use crate::pipeline::state::PipelineState;
use crate::pipeline::steps::{StageJob, StageRunner};
use crate::pipeline::storage::{ArtifactRef, ArtifactStore};

/// Drives one submission through clean, persist and analyze.
///
/// Test-specific behavior lives in the `TestProfile` the runner resolves;
/// the orchestrator only sequences stages, reports progress and formats
/// the response.
pub struct PipelineOrchestrator {
    runner: Arc<StageRunner>,
    store: ArtifactStore,
    queue: Option<Arc<dyn TaskQueue>>,
}

impl PipelineOrchestrator {
    pub fn new(runner: Arc<StageRunner>, store: ArtifactStore) -> Self {
        Self { runner, store, queue: None }
    }

    pub fn with_queue(mut self, queue: Arc<dyn TaskQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Run a raw submission payload end to end.
    pub async fn submit(&self, payload: &Value) -> Result<CompletionResponse> {
        let (dispatcher, ctx) = self.prepare_run().await;
        self.run_with(&ctx, dispatcher.as_ref(), || extract_request_paths(payload))
            .await
    }

    /// Run an already extracted request end to end.
    pub async fn run(&self, request: PipelineRequest) -> Result<CompletionResponse> {
        let (dispatcher, ctx) = self.prepare_run().await;
        self.run_with(&ctx, dispatcher.as_ref(), move || Ok(request)).await
    }

    /// Pick the dispatcher and build the run context.
    pub async fn prepare_run(&self) -> (Arc<dyn Dispatcher>, TaskContext) {
        let dispatcher = select_dispatcher(self.queue.clone(), self.runner.clone()).await;
        let ctx = TaskContext::new(Uuid::new_v4().to_string(), dispatcher.progress_sink());
        (dispatcher, ctx)
    }

    /// Run with a caller-supplied context and dispatcher. Intermediate
    /// artifacts are removed whether or not the run succeeds.
    #[instrument(skip_all, fields(task_id = %ctx.task_id(), mode = %dispatcher.mode()))]
    pub async fn run_with<F>(
        &self,
        ctx: &TaskContext,
        dispatcher: &dyn Dispatcher,
        request: F,
    ) -> Result<CompletionResponse>
    where
        F: FnOnce() -> Result<PipelineRequest> + Send,
    {
        let mut intermediates = Vec::new();
        let result = self.drive(ctx, dispatcher, request, &mut intermediates).await;

        for artifact in &intermediates {
            if let Err(e) = self.store.remove(artifact) {
                warn!(artifact = %artifact, error = %e, "Could not remove intermediate artifact");
            }
        }

        match result {
            Ok(response) => Ok(response),
            Err(e) => {
                let stage = ctx.stage();
                error!("❌ Pipeline run failed during {}: {}", stage, e);
                metrics::run::failed(stage.as_str());
                ctx.fail(&e).await;
                Err(e)
            }
        }
    }

    async fn drive<F>(
        &self,
        ctx: &TaskContext,
        dispatcher: &dyn Dispatcher,
        request: F,
        intermediates: &mut Vec<ArtifactRef>,
    ) -> Result<CompletionResponse>
    where
        F: FnOnce() -> Result<PipelineRequest> + Send,
    {
        ctx.transition(PipelineState::Preparing)?;
        let request = request()?;
        let profile = self.runner.registry().resolve(&request.test_name)?;
        let test_type = profile.test_type;
        for path in [&request.data_file_path, &request.config_file_path] {
            if !path.is_file() {
                return Err(PipelineError::InvalidRequest(format!(
                    "input file not found: {}",
                    path.display()
                )));
            }
        }
        info!(
            "🚀 Starting {} pipeline for {} (filter_by={})",
            request.test_name,
            request.data_filename,
            request.filter_by.as_str()
        );

        ctx.ensure_not_cancelled()?;
        ctx.transition(PipelineState::Cleaning)?;
        ctx.report(PROGRESS_CLEANING, PROGRESS_TOTAL, "Cleaning data").await;
        let cleaned = dispatcher
            .dispatch(
                ctx,
                StageJob::clean(
                    test_type,
                    request.data_file_path.clone(),
                    request.config_file_path.clone(),
                ),
            )
            .await?;
        intermediates.push(cleaned.artifact.clone());
        info!("✅ Cleaned {} rows", cleaned.rows);

        ctx.ensure_not_cancelled()?;
        ctx.transition(PipelineState::Persisting)?;
        ctx.report(PROGRESS_PERSISTING, PROGRESS_TOTAL, "Saving data to database").await;
        let persisted = dispatcher
            .dispatch(ctx, StageJob::persist(test_type, cleaned.artifact))
            .await?;
        intermediates.push(persisted.artifact.clone());
        info!("✅ Persisted {} rows", persisted.rows);

        ctx.ensure_not_cancelled()?;
        ctx.transition(PipelineState::Analyzing)?;
        ctx.report(
            PROGRESS_ANALYZING,
            PROGRESS_TOTAL,
            format!("Running {} analysis", request.test_name),
        )
        .await;
        let report = dispatcher
            .dispatch(
                ctx,
                StageJob::analyze(test_type, persisted.artifact, request.filter_by),
            )
            .await?;

        ctx.transition(PipelineState::Formatting)?;
        if !self.store.exists(&report.artifact) {
            return Err(ArtifactError::NotFound(report.artifact.to_string()).into());
        }
        let location = self.store.path_of(&report.artifact).display().to_string();
        let response = format_response(&request.test_name, &location);

        ctx.transition(PipelineState::Complete)?;
        ctx.report(PROGRESS_COMPLETE, PROGRESS_COMPLETE, response.status.clone())
            .await;
        metrics::run::completed(&request.test_name);
        info!("🎉 {} pipeline completed: {} report sheets at {}", request.test_name, report.rows, location);
        Ok(response)
    }
}
