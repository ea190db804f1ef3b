//! Serialised job queue for mutating batches
//!
//! Every batch that writes device status goes through one bounded channel
//! drained by a single worker task, so two batches never interleave their
//! transactions. Jobs can be cancelled while queued or, for intake, between
//! rows while running.
//!
//! Jobs awaited through [`JobQueue::run`] leave the table once their result is
//! delivered. Detached jobs stay pollable until more than `retained` finished
//! jobs pile up, then the oldest finished ones are evicted.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub type JobId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInfo {
    pub id: JobId,
    pub kind: String,
    pub status: JobStatus,
    pub submitted_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    /// JSON form of the job's result once it completed
    pub result: Option<serde_json::Value>,
}

enum JobOutcome {
    Completed(Option<serde_json::Value>),
    Failed(String),
    Cancelled,
}

type JobFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

struct QueuedJob {
    id: JobId,
    cancel: CancellationToken,
    run: Box<dyn FnOnce(CancellationToken) -> JobFuture + Send>,
}

struct JobEntry {
    info: JobInfo,
    cancel: CancellationToken,
    /// Order in which the job finished
    finished_seq: Option<u64>,
}

struct JobTable {
    entries: HashMap<JobId, JobEntry>,
    retained: usize,
    finished: u64,
}

impl JobTable {
    /// Drop the oldest finished jobs beyond the retention limit.
    fn evict_finished(&mut self) {
        let mut finished: Vec<(u64, JobId)> = self
            .entries
            .iter()
            .filter_map(|(id, entry)| entry.finished_seq.map(|seq| (seq, *id)))
            .collect();
        if finished.len() <= self.retained {
            return;
        }

        finished.sort();
        let excess = finished.len() - self.retained;
        for (_, id) in finished.into_iter().take(excess) {
            self.entries.remove(&id);
        }
        tracing::debug!(evicted = excess, "Evicted finished jobs");
    }
}

type SharedJobs = Arc<Mutex<JobTable>>;

#[derive(Clone)]
pub struct JobQueue {
    sender: mpsc::Sender<QueuedJob>,
    jobs: SharedJobs,
}

impl JobQueue {
    /// Create the queue and spawn its worker. Must be called inside a Tokio runtime.
    pub fn start(capacity: usize, retained: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let jobs: SharedJobs = Arc::new(Mutex::new(JobTable {
            entries: HashMap::new(),
            retained,
            finished: 0,
        }));

        tokio::spawn(run_worker(receiver, jobs.clone()));
        tracing::info!(capacity = capacity, retained = retained, "Job queue started");

        Self { sender, jobs }
    }

    /// Enqueue a job and return its id plus a receiver for the result.
    ///
    /// Waits for room when the queue is full. The receiver yields an error if
    /// the job is cancelled before it starts.
    pub async fn submit<T, F, Fut>(
        &self,
        kind: &str,
        task: F,
    ) -> AppResult<(JobInfo, oneshot::Receiver<AppResult<T>>)>
    where
        T: Serialize + Send + 'static,
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = AppResult<T>> + Send + 'static,
    {
        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let (result_tx, result_rx) = oneshot::channel();

        let info = JobInfo {
            id,
            kind: kind.to_string(),
            status: JobStatus::Queued,
            submitted_at: Utc::now(),
            finished_at: None,
            error: None,
            result: None,
        };
        self.jobs.lock().entries.insert(
            id,
            JobEntry {
                info: info.clone(),
                cancel: cancel.clone(),
                finished_seq: None,
            },
        );

        let table = self.jobs.clone();
        let run: Box<dyn FnOnce(CancellationToken) -> JobFuture + Send> =
            Box::new(move |token| {
                Box::pin(async move {
                    // A panicking task must not take the worker down with it
                    let result = match tokio::spawn(task(token)).await {
                        Ok(result) => result,
                        Err(e) if e.is_panic() => {
                            Err(AppError::Internal("Job panicked".to_string()))
                        }
                        Err(_) => Err(AppError::Cancelled),
                    };
                    let outcome = match &result {
                        Ok(value) => JobOutcome::Completed(serde_json::to_value(value).ok()),
                        Err(AppError::Cancelled) => JobOutcome::Cancelled,
                        Err(e) => JobOutcome::Failed(e.to_string()),
                    };
                    // State is final before the caller sees the result
                    finish(&table, id, outcome);
                    // Nobody may be waiting for a detached job
                    let _ = result_tx.send(result);
                })
            });

        if self.sender.send(QueuedJob { id, cancel, run }).await.is_err() {
            self.jobs.lock().entries.remove(&id);
            return Err(AppError::Unavailable("Job queue is not running".to_string()));
        }

        tracing::debug!(job_id = %id, kind = %kind, "Job queued");
        Ok((info, result_rx))
    }

    /// Enqueue a job and wait for its result.
    pub async fn run<T, F, Fut>(&self, kind: &str, task: F) -> AppResult<T>
    where
        T: Serialize + Send + 'static,
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = AppResult<T>> + Send + 'static,
    {
        let (info, receiver) = self.submit(kind, task).await?;
        let result = receiver.await.map_err(|_| AppError::Cancelled);
        // Nobody polls a job whose caller already has the result
        self.jobs.lock().entries.remove(&info.id);
        result?
    }

    pub fn status(&self, id: JobId) -> Option<JobInfo> {
        self.jobs.lock().entries.get(&id).map(|entry| entry.info.clone())
    }

    /// Jobs currently tracked, finished or not.
    pub fn tracked(&self) -> usize {
        self.jobs.lock().entries.len()
    }

    /// Request cancellation. Finished jobs are returned unchanged.
    pub fn cancel(&self, id: JobId) -> AppResult<JobInfo> {
        let jobs = self.jobs.lock();
        let entry = jobs
            .entries
            .get(&id)
            .ok_or_else(|| AppError::not_found(format!("Job {} not found", id)))?;

        if !entry.info.status.is_terminal() {
            entry.cancel.cancel();
            tracing::info!(job_id = %id, kind = %entry.info.kind, "Cancellation requested");
        }
        Ok(entry.info.clone())
    }
}

async fn run_worker(mut receiver: mpsc::Receiver<QueuedJob>, jobs: SharedJobs) {
    while let Some(job) = receiver.recv().await {
        if job.cancel.is_cancelled() {
            // Dropping the job drops its result sender
            finish(&jobs, job.id, JobOutcome::Cancelled);
            continue;
        }

        set_status(&jobs, job.id, JobStatus::Running);
        tracing::debug!(job_id = %job.id, "Job started");

        (job.run)(job.cancel.clone()).await;
    }
    tracing::info!("Job queue worker stopped");
}

fn set_status(jobs: &SharedJobs, id: JobId, status: JobStatus) {
    if let Some(entry) = jobs.lock().entries.get_mut(&id) {
        entry.info.status = status;
    }
}

fn finish(jobs: &SharedJobs, id: JobId, outcome: JobOutcome) {
    let mut jobs = jobs.lock();
    jobs.finished += 1;
    let seq = jobs.finished;
    let Some(entry) = jobs.entries.get_mut(&id) else {
        return;
    };

    entry.finished_seq = Some(seq);
    entry.info.finished_at = Some(Utc::now());
    match outcome {
        JobOutcome::Completed(result) => {
            entry.info.status = JobStatus::Completed;
            entry.info.result = result;
        }
        JobOutcome::Failed(error) => {
            tracing::warn!(job_id = %id, kind = %entry.info.kind, error = %error, "Job failed");
            entry.info.status = JobStatus::Failed;
            entry.info.error = Some(error);
        }
        JobOutcome::Cancelled => {
            tracing::info!(job_id = %id, kind = %entry.info.kind, "Job cancelled");
            entry.info.status = JobStatus::Cancelled;
        }
    }
    jobs.evict_finished();
}
