//! Generation Queue
//!
//! FIFO dispatcher for provider-bound generation jobs. A fixed pool of workers,
//! one per concurrency slot, pulls jobs off the head of the queue, so at most
//! `max_concurrent` jobs run at once and jobs start in submission order.
//! Queue state lives in-process; positions are only meaningful per instance.

use crate::error::{DispatchError, PipelineError, ProviderError};
use crate::provider::RawText;
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Job ID for tracking completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

impl JobId {
    fn next() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        JobId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

type JobResult = Result<RawText, PipelineError>;
type ExecuteFn = Box<dyn FnOnce() -> BoxFuture<'static, Result<RawText, ProviderError>> + Send>;

/// A queued unit of work wrapping one provider call
struct Job {
    id: JobId,
    user_id: String,
    submitted_at: Instant,
    execute: ExecuteFn,
    completion_tx: oneshot::Sender<JobResult>,
}

struct RunningJob {
    id: JobId,
    user_id: String,
}

fn default_max_concurrent() -> usize {
    1
}

/// Configuration for the generation queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Jobs allowed to run at the same time
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Waiting jobs allowed before admission fails. `None` leaves the queue unbounded.
    #[serde(default)]
    pub max_queue_depth: Option<usize>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            max_queue_depth: None,
        }
    }
}

impl QueueConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrent == 0 {
            return Err("max_concurrent must be at least 1".to_string());
        }
        if self.max_queue_depth == Some(0) {
            return Err("max_queue_depth must be at least 1 when set".to_string());
        }
        Ok(())
    }
}

/// Point-in-time view of the queue for one user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    /// Jobs waiting or running
    pub queue_length: usize,
    /// Jobs ahead of the user's most recently submitted job that has not started
    pub user_position: usize,
    pub is_processing: bool,
}

/// Where a specific job currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Queued { position: usize },
    Running,
}

/// Queue statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

#[derive(Default)]
struct QueueState {
    waiting: VecDeque<Job>,
    running: Vec<RunningJob>,
    stats: QueueStats,
    closed: bool,
}

impl QueueState {
    /// Move the head of the queue into the running set
    fn start_next(&mut self) -> Option<Job> {
        let job = self.waiting.pop_front()?;
        self.running.push(RunningJob {
            id: job.id,
            user_id: job.user_id.clone(),
        });
        self.stats.pending = self.stats.pending.saturating_sub(1);
        self.stats.processing += 1;
        Some(job)
    }

    fn finish(&mut self, id: JobId, succeeded: bool) {
        self.running.retain(|running| running.id != id);
        self.stats.processing = self.stats.processing.saturating_sub(1);
        if succeeded {
            self.stats.completed += 1;
        } else {
            self.stats.failed += 1;
        }
    }
}

struct Shared {
    state: Mutex<QueueState>,
    notify: Notify,
    shutdown: CancellationToken,
}

impl Shared {
    fn start_next(&self) -> Option<Job> {
        let mut state = self.state.lock();
        let job = state.start_next();
        // Hand the wakeup on so idle workers are not left sleeping on a non-empty queue.
        if job.is_some() && !state.waiting.is_empty() {
            self.notify.notify_one();
        }
        job
    }

    /// Record completion and, unless shutting down, start the next job in the
    /// same critical section so positions move the moment a job finishes.
    fn finish_and_start_next(&self, id: JobId, succeeded: bool) -> Option<Job> {
        let mut state = self.state.lock();
        state.finish(id, succeeded);
        if self.shutdown.is_cancelled() {
            return None;
        }
        let job = state.start_next();
        if job.is_some() && !state.waiting.is_empty() {
            self.notify.notify_one();
        }
        job
    }
}

/// Future resolving to the outcome of an enqueued job.
///
/// Dropping the handle does not cancel the job; it still runs to completion or timeout.
pub struct JobHandle {
    id: JobId,
    rx: oneshot::Receiver<JobResult>,
}

impl JobHandle {
    pub fn id(&self) -> JobId {
        self.id
    }
}

impl Future for JobHandle {
    type Output = JobResult;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        Pin::new(&mut this.rx)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Err(DispatchError::Closed.into())))
    }
}

/// Process-wide generation dispatcher, constructed once and shared by reference
pub struct QueueDispatcher {
    shared: Arc<Shared>,
    config: QueueConfig,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl QueueDispatcher {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState::default()),
                notify: Notify::new(),
                shutdown: CancellationToken::new(),
            }),
            config,
            workers: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Append a job to the tail of the queue.
    ///
    /// Only fails when the dispatcher is shut down or a configured depth is reached;
    /// the returned handle carries the job's own outcome.
    pub fn enqueue<F, Fut>(&self, user_id: impl Into<String>, execute: F) -> Result<JobHandle, DispatchError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<RawText, ProviderError>> + Send + 'static,
    {
        let user_id = user_id.into();
        let id = JobId::next();
        let (completion_tx, rx) = oneshot::channel();

        let position = {
            let mut state = self.shared.state.lock();
            if state.closed {
                return Err(DispatchError::Closed);
            }
            if let Some(max_depth) = self.config.max_queue_depth {
                if state.waiting.len() >= max_depth {
                    warn!(
                        queue_size = state.waiting.len(),
                        max_size = max_depth,
                        user_id = %user_id,
                        "Generation queue is full, rejecting job"
                    );
                    return Err(DispatchError::QueueFull {
                        depth: state.waiting.len(),
                    });
                }
            }
            state.waiting.push_back(Job {
                id,
                user_id: user_id.clone(),
                submitted_at: Instant::now(),
                execute: Box::new(move || execute().boxed()),
                completion_tx,
            });
            state.stats.pending += 1;
            state.waiting.len() - 1
        };

        self.shared.notify.notify_one();
        debug!(
            job_id = id.as_u64(),
            user_id = %user_id,
            position,
            "Enqueued generation job"
        );

        Ok(JobHandle { id, rx })
    }

    /// Snapshot of queue depth and the user's position. Never mutates state.
    pub fn status(&self, user_id: &str) -> QueueSnapshot {
        let state = self.shared.state.lock();
        QueueSnapshot {
            queue_length: state.waiting.len() + state.running.len(),
            user_position: state
                .waiting
                .iter()
                .rposition(|job| job.user_id == user_id)
                .unwrap_or(0),
            is_processing: !state.running.is_empty(),
        }
    }

    /// State of a specific job, or `None` once it has finished.
    pub fn job_state(&self, id: JobId) -> Option<JobState> {
        let state = self.shared.state.lock();
        if let Some(position) = state.waiting.iter().position(|job| job.id == id) {
            return Some(JobState::Queued { position });
        }
        state
            .running
            .iter()
            .any(|running| running.id == id)
            .then_some(JobState::Running)
    }

    /// State of the user's earliest outstanding job. A running job takes
    /// precedence over any the user still has waiting.
    pub fn user_state(&self, user_id: &str) -> Option<JobState> {
        let state = self.shared.state.lock();
        if state.running.iter().any(|running| running.user_id == user_id) {
            return Some(JobState::Running);
        }
        state
            .waiting
            .iter()
            .position(|job| job.user_id == user_id)
            .map(|position| JobState::Queued { position })
    }

    pub fn stats(&self) -> QueueStats {
        self.shared.state.lock().stats.clone()
    }

    /// Start background workers, one per concurrency slot
    pub fn start(&self) -> Result<(), DispatchError> {
        if self.shared.state.lock().closed {
            return Err(DispatchError::Closed);
        }
        let mut workers = self.workers.lock();
        if !workers.is_empty() {
            return Ok(());
        }

        for worker_id in 0..self.config.max_concurrent.max(1) {
            let shared = Arc::clone(&self.shared);
            workers.push(tokio::spawn(worker_loop(worker_id, shared)));
        }

        info!(worker_count = workers.len(), "Started generation queue workers");
        Ok(())
    }

    /// Stop workers after their current job and fail every job still waiting.
    pub async fn stop(&self) {
        self.shared.state.lock().closed = true;
        self.shared.shutdown.cancel();

        let workers = std::mem::take(&mut *self.workers.lock());
        for handle in workers {
            let _ = handle.await;
        }

        let abandoned: Vec<Job> = {
            let mut state = self.shared.state.lock();
            state.stats.pending = 0;
            state.waiting.drain(..).collect()
        };
        if !abandoned.is_empty() {
            warn!(abandoned = abandoned.len(), "Dropped waiting jobs on shutdown");
        }
        for job in abandoned {
            let _ = job.completion_tx.send(Err(DispatchError::Closed.into()));
        }
        info!("Stopped generation queue workers");
    }

    /// Wait until nothing is waiting or running
    pub async fn wait_idle(&self, timeout: Option<Duration>) -> Result<(), DispatchError> {
        let start = Instant::now();
        loop {
            {
                let state = self.shared.state.lock();
                if state.waiting.is_empty() && state.running.is_empty() {
                    return Ok(());
                }
            }
            if let Some(timeout) = timeout {
                if start.elapsed() >= timeout {
                    return Err(DispatchError::Aborted(
                        "Timeout waiting for queue to drain".to_string(),
                    ));
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl Drop for QueueDispatcher {
    fn drop(&mut self) {
        self.shared.state.lock().closed = true;
        self.shared.shutdown.cancel();
    }
}

async fn worker_loop(worker_id: usize, shared: Arc<Shared>) {
    debug!(worker_id, "Worker started");
    let mut next: Option<Job> = None;

    loop {
        let job = match next.take() {
            Some(job) => job,
            None => {
                if shared.shutdown.is_cancelled() {
                    break;
                }
                match shared.start_next() {
                    Some(job) => job,
                    None => {
                        tokio::select! {
                            _ = shared.notify.notified() => continue,
                            _ = shared.shutdown.cancelled() => break,
                        }
                    }
                }
            }
        };

        let Job {
            id,
            user_id,
            submitted_at,
            execute,
            completion_tx,
        } = job;
        let wait_ms = submitted_at.elapsed().as_millis();
        info!(worker_id, job_id = id.as_u64(), user_id = %user_id, wait_ms, "Generation job started");

        let started = Instant::now();
        // Building the future runs caller code too
        let outcome = match std::panic::catch_unwind(AssertUnwindSafe(execute)) {
            Ok(future) => AssertUnwindSafe(future).catch_unwind().await,
            Err(panic) => Err(panic),
        };
        let result: JobResult = match outcome {
            Ok(outcome) => outcome.map_err(PipelineError::from),
            Err(_) => Err(DispatchError::Aborted("generation job panicked".to_string()).into()),
        };
        let duration_ms = started.elapsed().as_millis();

        match &result {
            Ok(_) => info!(worker_id, job_id = id.as_u64(), duration_ms, "Generation job completed"),
            Err(e) => warn!(worker_id, job_id = id.as_u64(), duration_ms, error = %e, "Generation job failed"),
        }

        next = shared.finish_and_start_next(id, result.is_ok());
        if completion_tx.send(result).is_err() {
            debug!(job_id = id.as_u64(), "Job handle dropped before completion");
        }
    }

    debug!(worker_id, "Worker stopped");
}
