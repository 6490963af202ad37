use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::app::ports::TaskQueue;
use crate::common::error::{EnrichError, PipelineError, QueueError};
use crate::pipeline::state::ProgressState;
use crate::pipeline::steps::{JobId, StageJob, StageOutput, StageRunner};

const CHANNEL_BUFFER_SIZE: usize = 64;

/// Why a job failed, in the form a worker sends back. Enrichment errors keep
/// their type so a queued run fails the same way an inline one does.
#[derive(Debug, Serialize, Deserialize)]
enum JobFailure {
    Enrich(EnrichError),
    Other(String),
}

impl From<PipelineError> for JobFailure {
    fn from(error: PipelineError) -> Self {
        match error {
            PipelineError::Enrich(e) => JobFailure::Enrich(e),
            other => JobFailure::Other(other.to_string()),
        }
    }
}

/// Serialized output on success.
type JobOutcome = Result<String, JobFailure>;

enum QueueMessage {
    Run {
        id: JobId,
        payload: String,
        reply: oneshot::Sender<JobOutcome>,
    },
    Ping(oneshot::Sender<()>),
}

struct PendingJob {
    stage: &'static str,
    result: oneshot::Receiver<JobOutcome>,
}

/// Task queue backed by a pool of tokio workers in this process.
///
/// Jobs cross the channel as JSON, the same as they would through an
/// external broker, so worker code never shares a table with the submitter.
pub struct LocalWorkerQueue {
    sender: mpsc::Sender<QueueMessage>,
    pending: Mutex<HashMap<JobId, PendingJob>>,
    states: RwLock<HashMap<String, ProgressState>>,
    ping_timeout: Duration,
    shutdown: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl LocalWorkerQueue {
    /// Spawn `workers` worker tasks on the current runtime.
    pub fn start(runner: Arc<StageRunner>, workers: usize, ping_timeout: Duration) -> Arc<Self> {
        let (sender, receiver) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let shutdown = CancellationToken::new();

        let handles = (0..workers.max(1))
            .map(|worker| {
                tokio::spawn(worker_loop(
                    worker,
                    receiver.clone(),
                    runner.clone(),
                    shutdown.clone(),
                ))
            })
            .collect();
        info!("Started local task queue with {} workers", workers.max(1));

        Arc::new(Self {
            sender,
            pending: Mutex::new(HashMap::new()),
            states: RwLock::new(HashMap::new()),
            ping_timeout,
            shutdown,
            workers: Mutex::new(handles),
        })
    }

    /// Stop the workers. Jobs still waiting in the channel are dropped and
    /// their waiters see `QueueError::WorkerLost`.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handles: Vec<JoinHandle<()>> = self.lock_workers().drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Queue worker ended abnormally: {}", e);
            }
        }
        debug!("Local task queue shut down");
    }

    fn lock_pending(&self) -> MutexGuard<'_, HashMap<JobId, PendingJob>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_workers(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn worker_loop(
    worker: usize,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<QueueMessage>>>,
    runner: Arc<StageRunner>,
    shutdown: CancellationToken,
) {
    loop {
        let message = {
            let mut receiver = receiver.lock().await;
            tokio::select! {
                _ = shutdown.cancelled() => None,
                message = receiver.recv() => message,
            }
        };
        match message {
            None => break,
            Some(QueueMessage::Ping(reply)) => {
                let _ = reply.send(());
            }
            Some(QueueMessage::Run { id, payload, reply }) => {
                debug!(worker, job_id = %id, "Worker picked up job");
                let outcome = execute(&runner, &payload).await;
                if reply.send(outcome).is_err() {
                    warn!(worker, job_id = %id, "Job finished but nobody is waiting for it");
                }
            }
        }
    }
    debug!(worker, "Queue worker stopped");
}

async fn execute(runner: &StageRunner, payload: &str) -> JobOutcome {
    let job: StageJob = serde_json::from_str(payload)
        .map_err(|e| JobFailure::Other(format!("undecodable job: {}", e)))?;
    let output = runner.run(job).await?;
    serde_json::to_string(&output).map_err(|e| JobFailure::Other(e.to_string()))
}

#[async_trait]
impl TaskQueue for LocalWorkerQueue {
    async fn ping(&self) -> bool {
        if self.shutdown.is_cancelled() {
            return false;
        }
        let (reply, answer) = oneshot::channel();
        let probe = async {
            self.sender.send(QueueMessage::Ping(reply)).await.ok()?;
            answer.await.ok()
        };
        matches!(tokio::time::timeout(self.ping_timeout, probe).await, Ok(Some(())))
    }

    async fn submit(&self, job: StageJob) -> Result<JobId, QueueError> {
        if self.shutdown.is_cancelled() {
            return Err(QueueError::Closed);
        }
        let id = JobId::new();
        let stage = job.stage_name();
        let payload = serde_json::to_string(&job)?;
        let (reply, result) = oneshot::channel();

        self.lock_pending()
            .insert(id.clone(), PendingJob { stage, result });
        let sent = self
            .sender
            .send(QueueMessage::Run { id: id.clone(), payload, reply })
            .await;
        if sent.is_err() {
            self.lock_pending().remove(&id);
            return Err(QueueError::Closed);
        }
        Ok(id)
    }

    async fn wait(&self, job: &JobId) -> Result<StageOutput, PipelineError> {
        let pending = self
            .lock_pending()
            .remove(job)
            .ok_or_else(|| QueueError::UnknownJob(job.to_string()))?;

        let outcome = pending
            .result
            .await
            .map_err(|_| QueueError::WorkerLost(job.to_string()))?;
        match outcome {
            Ok(json) => Ok(serde_json::from_str(&json).map_err(QueueError::Payload)?),
            Err(JobFailure::Enrich(e)) => Err(PipelineError::Enrich(e)),
            Err(JobFailure::Other(message)) => Err(PipelineError::JobFailed {
                stage: pending.stage.to_string(),
                message,
            }),
        }
    }

    async fn publish_state(&self, task_id: &str, state: ProgressState) {
        self.states
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(task_id.to_string(), state);
    }

    async fn state(&self, task_id: &str) -> Option<ProgressState> {
        self.states
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(task_id)
            .cloned()
    }
}
