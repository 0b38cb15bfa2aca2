//! Core job types: lifecycle status, result slot, errors.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use jsondb_core::JobId;

/// Job lifecycle status.
///
/// Strictly forward: `Queued → Running → Complete`. No retries, no cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting in the FIFO.
    Queued,
    /// Being executed by the worker.
    Running,
    /// Finished; the result slot is populated.
    Complete,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Complete)
    }
}

/// Failure delivered to a waiting caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobError {
    /// The work returned an error.
    #[error("job failed: {0}")]
    Failed(String),
    /// The work panicked; the worker survived.
    #[error("job panicked: {0}")]
    Panicked(String),
    /// The caller stopped waiting. The job itself still runs to completion.
    #[error("timed out after {0:?} waiting for job")]
    Timeout(Duration),
    /// The job was dropped before the worker ran it.
    #[error("job abandoned before it ran")]
    Abandoned,
}

/// Submission failure.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue is shutting down")]
    ShuttingDown,
    #[error("queue worker is gone")]
    WorkerGone,
    #[error("failed to spawn queue worker: {0}")]
    Spawn(#[from] std::io::Error),
    #[error(transparent)]
    Job(#[from] JobError),
}

/// Timing of one job, recorded by the worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    fn new() -> Self {
        Self {
            submitted_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Time between the worker picking the job up and finishing it.
    pub fn duration_ms(&self) -> Option<u64> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds().max(0) as u64),
            _ => None,
        }
    }
}

struct JobSlot<T> {
    status: JobStatus,
    record: JobRecord,
    outcome: Option<Result<T, JobError>>,
}

/// State shared between a queued job and its handle.
///
/// The outcome is written in the same critical section that sets
/// `Complete`, so a waiter never observes one without the other.
pub(crate) struct JobCell<T> {
    slot: Mutex<JobSlot<T>>,
    completed: Condvar,
}

impl<T> JobCell<T> {
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(JobSlot {
                status: JobStatus::Queued,
                record: JobRecord::new(),
                outcome: None,
            }),
            completed: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, JobSlot<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn mark_running(&self) {
        let mut slot = self.lock();
        slot.status = JobStatus::Running;
        slot.record.started_at = Some(Utc::now());
    }

    pub(crate) fn complete(&self, outcome: Result<T, JobError>) -> JobRecord {
        let record = {
            let mut slot = self.lock();
            let now = Utc::now();
            slot.record.started_at.get_or_insert(now);
            slot.record.finished_at = Some(now);
            slot.outcome = Some(outcome);
            slot.status = JobStatus::Complete;
            slot.record.clone()
        };
        self.completed.notify_all();
        record
    }

    fn status(&self) -> JobStatus {
        self.lock().status
    }

    fn record(&self) -> JobRecord {
        self.lock().record.clone()
    }

    /// Block until complete, or until `deadline` passes.
    fn wait_until(&self, deadline: Option<(Instant, Duration)>) -> Result<T, JobError> {
        let mut slot = self.lock();
        while !slot.status.is_terminal() {
            slot = match deadline {
                None => self
                    .completed
                    .wait(slot)
                    .unwrap_or_else(PoisonError::into_inner),
                Some((at, timeout)) => {
                    let remaining = at.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Err(JobError::Timeout(timeout));
                    }
                    self.completed
                        .wait_timeout(slot, remaining)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
        slot.outcome.take().unwrap_or(Err(JobError::Abandoned))
    }
}

/// Handle to one submitted job.
///
/// Read once by the submitting caller via [`JobHandle::wait`], then dropped.
pub struct JobHandle<T> {
    id: JobId,
    cell: Arc<JobCell<T>>,
}

impl<T> JobHandle<T> {
    pub(crate) fn new(id: JobId, cell: Arc<JobCell<T>>) -> Self {
        Self { id, cell }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    /// Current lifecycle status.
    pub fn status(&self) -> JobStatus {
        self.cell.status()
    }

    pub fn record(&self) -> JobRecord {
        self.cell.record()
    }

    /// Block until the job is complete and return its result.
    pub fn wait(self) -> Result<T, JobError> {
        self.cell.wait_until(None)
    }

    /// Like [`wait`](Self::wait), but give up after `timeout`.
    pub fn wait_timeout(self, timeout: Duration) -> Result<T, JobError> {
        self.cell.wait_until(Some((Instant::now() + timeout, timeout)))
    }
}

impl<T> std::fmt::Debug for JobHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle")
            .field("id", &self.id)
            .field("status", &self.status())
            .finish()
    }
}
