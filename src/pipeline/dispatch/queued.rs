use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::{DispatchMode, Dispatcher, TaskContext};
use crate::app::ports::{ProgressSink, TaskQueue};
use crate::common::error::Result;
use crate::pipeline::state::ProgressState;
use crate::pipeline::steps::{StageJob, StageOutput};

/// Submits each stage to the task queue and blocks on its result.
pub struct QueuedDispatcher {
    queue: Arc<dyn TaskQueue>,
}

impl QueuedDispatcher {
    pub fn new(queue: Arc<dyn TaskQueue>) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl Dispatcher for QueuedDispatcher {
    fn mode(&self) -> DispatchMode {
        DispatchMode::Queued
    }

    fn progress_sink(&self) -> Option<Arc<dyn ProgressSink>> {
        Some(Arc::new(QueueProgress::new(self.queue.clone())))
    }

    async fn dispatch(&self, ctx: &TaskContext, job: StageJob) -> Result<StageOutput> {
        let stage = job.stage_name();
        let job_id = self.queue.submit(job).await?;
        ctx.record_subtask(job_id.as_str());
        debug!(task_id = %ctx.task_id(), stage, job_id = %job_id, "Submitted stage to queue");
        self.queue.wait(&job_id).await
    }
}

/// Publishes run progress on the queue's status channel.
pub struct QueueProgress {
    queue: Arc<dyn TaskQueue>,
}

impl QueueProgress {
    pub fn new(queue: Arc<dyn TaskQueue>) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl ProgressSink for QueueProgress {
    async fn publish(&self, task_id: &str, state: ProgressState) {
        self.queue.publish_state(task_id, state).await;
    }
}
