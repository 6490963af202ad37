use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::app::ports::ProgressSink;
use crate::common::error::{PipelineError, Result};
use crate::pipeline::state::{PipelineState, TaskState};

/// Explicit per-run context handed to every stage call: the run's state,
/// where progress goes, and its cancellation token.
pub struct TaskContext {
    task_id: String,
    progress: Option<Arc<dyn ProgressSink>>,
    cancel: CancellationToken,
    state: Mutex<TaskState>,
}

impl TaskContext {
    pub fn new(task_id: impl Into<String>, progress: Option<Arc<dyn ProgressSink>>) -> Self {
        Self {
            task_id: task_id.into(),
            progress,
            cancel: CancellationToken::new(),
            state: Mutex::new(TaskState::new()),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn ensure_not_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        Ok(())
    }

    pub fn reports_progress(&self) -> bool {
        self.progress.is_some()
    }

    pub fn stage(&self) -> PipelineState {
        self.lock().stage
    }

    pub fn snapshot(&self) -> TaskState {
        self.lock().clone()
    }

    pub fn transition(&self, to: PipelineState) -> Result<()> {
        self.lock().transition(to)
    }

    pub fn record_subtask(&self, job_id: impl Into<String>) {
        self.lock().subtask_ids.push(job_id.into());
    }

    /// Update progress and push it, when a sink is attached.
    pub async fn report(&self, current: u32, total: u32, status: impl Into<String>) {
        let payload = {
            let mut state = self.lock();
            state.set_progress(current, total, status);
            state.payload()
        };
        if let Some(sink) = &self.progress {
            debug!(task_id = %self.task_id, state = %payload.state, current, total, "Reporting progress");
            sink.publish(&self.task_id, payload).await;
        }
    }

    /// Move to FAILED (unless already terminal) and push the failure.
    pub async fn fail(&self, error: &PipelineError) {
        let payload = {
            let mut state = self.lock();
            if !state.stage.is_terminal() {
                let _ = state.transition(PipelineState::Failed);
            }
            state.status_message = error.to_string();
            state.payload()
        };
        if let Some(sink) = &self.progress {
            sink.publish(&self.task_id, payload).await;
        }
    }

    fn lock(&self) -> MutexGuard<'_, TaskState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
