//! Runs a stage either through the task queue or in-process. Callers see
//! the same `StageOutput` and the same artifact-store effects either way.

pub mod context;
pub mod inline;
pub mod queued;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::app::ports::{ProgressSink, TaskQueue};
use crate::common::error::Result;
use crate::observability::metrics;
use crate::pipeline::steps::{StageJob, StageOutput, StageRunner};

pub use context::TaskContext;
pub use inline::InlineDispatcher;
pub use queued::{QueueProgress, QueuedDispatcher};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    Queued,
    Inline,
}

impl DispatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchMode::Queued => "queued",
            DispatchMode::Inline => "inline",
        }
    }
}

impl fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait Dispatcher: Send + Sync {
    fn mode(&self) -> DispatchMode;

    /// Where run progress should be published. Only a live queue has one.
    fn progress_sink(&self) -> Option<Arc<dyn ProgressSink>> {
        None
    }

    async fn dispatch(&self, ctx: &TaskContext, job: StageJob) -> Result<StageOutput>;
}

/// True when a queue is configured and a worker answers its ping.
pub async fn is_queue_alive(queue: Option<&dyn TaskQueue>) -> bool {
    match queue {
        Some(queue) => queue.ping().await,
        None => false,
    }
}

/// Probe the queue once and pick the dispatcher for a whole run.
pub async fn select_dispatcher(
    queue: Option<Arc<dyn TaskQueue>>,
    runner: Arc<StageRunner>,
) -> Arc<dyn Dispatcher> {
    let alive = is_queue_alive(queue.as_deref()).await;
    let dispatcher: Arc<dyn Dispatcher> = match queue {
        Some(queue) if alive => Arc::new(QueuedDispatcher::new(queue)),
        Some(_) => {
            warn!("Task queue did not answer ping, running stages inline");
            Arc::new(InlineDispatcher::new(runner))
        }
        None => Arc::new(InlineDispatcher::new(runner)),
    };
    info!(mode = %dispatcher.mode(), "Selected dispatcher");
    metrics::dispatch::mode(dispatcher.mode().as_str());
    dispatcher
}
