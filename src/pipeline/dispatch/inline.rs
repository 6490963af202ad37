use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::{DispatchMode, Dispatcher, TaskContext};
use crate::common::error::Result;
use crate::pipeline::steps::{StageJob, StageOutput, StageRunner};

/// Runs each stage in-process on the calling task.
pub struct InlineDispatcher {
    runner: Arc<StageRunner>,
}

impl InlineDispatcher {
    pub fn new(runner: Arc<StageRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl Dispatcher for InlineDispatcher {
    fn mode(&self) -> DispatchMode {
        DispatchMode::Inline
    }

    async fn dispatch(&self, ctx: &TaskContext, job: StageJob) -> Result<StageOutput> {
        debug!(task_id = %ctx.task_id(), stage = job.stage_name(), "Running stage inline");
        self.runner.run(job).await
    }
}
