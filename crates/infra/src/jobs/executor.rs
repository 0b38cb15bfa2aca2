//! Single-worker FIFO job queue.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use jsondb_core::JobId;

use super::types::{JobCell, JobError, JobHandle, QueueError};

/// Job queue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Worker thread name, also used in logs
    pub name: String,
    /// Default limit for [`JobQueue::run`]; `None` waits forever
    pub wait_timeout: Option<Duration>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: "jsondb-queue".to_string(),
            wait_timeout: None,
        }
    }
}

impl QueueConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = Some(timeout);
        self
    }
}

/// Queue runtime statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueStats {
    pub jobs_submitted: u64,
    pub jobs_processed: u64,
    pub jobs_succeeded: u64,
    pub jobs_failed: u64,
    pub jobs_panicked: u64,
    pub queued: u64,
    pub uptime_secs: u64,
}

enum Outcome {
    Succeeded,
    Failed,
    Panicked,
}

/// Type-erased job as seen by the worker.
trait QueuedJob: Send {
    fn id(&self) -> JobId;
    fn run(self: Box<Self>) -> Outcome;
}

struct Job<T, F> {
    id: JobId,
    cell: Arc<JobCell<T>>,
    work: Option<F>,
}

impl<T, F> QueuedJob for Job<T, F>
where
    T: Send + 'static,
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
{
    fn id(&self) -> JobId {
        self.id
    }

    fn run(mut self: Box<Self>) -> Outcome {
        let Some(work) = self.work.take() else {
            return Outcome::Failed;
        };

        self.cell.mark_running();

        let (outcome, result) = match panic::catch_unwind(AssertUnwindSafe(work)) {
            Ok(Ok(value)) => (Outcome::Succeeded, Ok(value)),
            Ok(Err(e)) => (Outcome::Failed, Err(JobError::Failed(format!("{e:#}")))),
            Err(payload) => {
                let msg = panic_message(payload.as_ref());
                (Outcome::Panicked, Err(JobError::Panicked(msg)))
            }
        };

        if let Err(e) = &result {
            warn!(job_id = %self.id, error = %e, "job did not succeed");
        }

        let record = self.cell.complete(result);
        debug!(
            job_id = %self.id,
            duration_ms = record.duration_ms().unwrap_or_default(),
            "job complete"
        );

        outcome
    }
}

impl<T, F> Drop for Job<T, F> {
    fn drop(&mut self) {
        // Never run: release whoever is waiting on it.
        if self.work.take().is_some() {
            self.cell.complete(Err(JobError::Abandoned));
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// FIFO work queue drained by exactly one background thread.
///
/// Jobs run one at a time in submission order, whoever submitted them. This is
/// the only mutual exclusion the store relies on.
///
/// The queue owns its worker: [`shutdown`](Self::shutdown) (or dropping the
/// queue) stops new submissions, drains what is already queued and joins the
/// thread.
pub struct JobQueue {
    name: String,
    wait_timeout: Option<Duration>,
    sender: Mutex<Option<mpsc::Sender<Box<dyn QueuedJob>>>>,
    join: Mutex<Option<thread::JoinHandle<()>>>,
    worker: thread::ThreadId,
    stats: Arc<Mutex<QueueStats>>,
    started: Instant,
}

impl JobQueue {
    /// Spawn the worker and start accepting jobs.
    pub fn start(config: QueueConfig) -> Result<Self, QueueError> {
        let (sender, receiver) = mpsc::channel::<Box<dyn QueuedJob>>();
        let stats = Arc::new(Mutex::new(QueueStats::default()));

        let worker_stats = stats.clone();
        let worker_name = config.name.clone();
        let join = thread::Builder::new()
            .name(config.name.clone())
            .spawn(move || worker_loop(worker_name, receiver, worker_stats))?;

        Ok(Self {
            name: config.name,
            wait_timeout: config.wait_timeout,
            sender: Mutex::new(Some(sender)),
            worker: join.thread().id(),
            join: Mutex::new(Some(join)),
            stats,
            started: Instant::now(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append `work` to the tail of the queue.
    ///
    /// Returns immediately; the handle starts out `Queued`.
    pub fn submit<T, F>(&self, work: F) -> Result<JobHandle<T>, QueueError>
    where
        T: Send + 'static,
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        let id = JobId::new();
        let cell = Arc::new(JobCell::new());
        let job = Box::new(Job {
            id,
            cell: cell.clone(),
            work: Some(work),
        });

        let sender = lock(&self.sender);
        let sender = sender.as_ref().ok_or(QueueError::ShuttingDown)?;

        lock(&self.stats).jobs_submitted += 1;
        if sender.send(job).is_err() {
            lock(&self.stats).jobs_submitted -= 1;
            error!(queue = %self.name, job_id = %id, "worker is gone; job rejected");
            return Err(QueueError::WorkerGone);
        }

        debug!(queue = %self.name, job_id = %id, "job queued");
        Ok(JobHandle::new(id, cell))
    }

    /// Submit `work` and block until it completes.
    ///
    /// Honors the configured `wait_timeout`. A timed-out job still runs.
    pub fn run<T, F>(&self, work: F) -> Result<T, QueueError>
    where
        T: Send + 'static,
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        let handle = self.submit(work)?;
        let result = match self.wait_timeout {
            Some(timeout) => handle.wait_timeout(timeout),
            None => handle.wait(),
        };
        Ok(result?)
    }

    /// Whether new submissions are accepted.
    pub fn is_accepting(&self) -> bool {
        lock(&self.sender).is_some()
    }

    pub fn stats(&self) -> QueueStats {
        let mut stats = lock(&self.stats).clone();
        stats.queued = stats.jobs_submitted.saturating_sub(stats.jobs_processed);
        stats.uptime_secs = self.started.elapsed().as_secs();
        stats
    }

    /// Stop accepting jobs, drain the queue and join the worker.
    ///
    /// Idempotent, and every caller returns only once the worker is gone.
    /// Called from inside a job it only stops submissions, since the worker
    /// cannot join itself.
    pub fn shutdown(&self) {
        if thread::current().id() == self.worker {
            if lock(&self.sender).take().is_some() {
                warn!(queue = %self.name, "shutdown requested from the worker; not joining");
            }
            return;
        }

        // Held across the join so concurrent callers wait for the drain too.
        let mut join = lock(&self.join);
        drop(lock(&self.sender).take());

        let Some(handle) = join.take() else {
            return;
        };
        if handle.join().is_err() {
            error!(queue = %self.name, "queue worker panicked");
        }
    }
}

impl Drop for JobQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobQueue")
            .field("name", &self.name)
            .field("accepting", &self.is_accepting())
            .finish()
    }
}

fn worker_loop(
    name: String,
    receiver: mpsc::Receiver<Box<dyn QueuedJob>>,
    stats: Arc<Mutex<QueueStats>>,
) {
    info!(queue = %name, "job queue worker started");

    // Ends once every sender is dropped and the channel is empty.
    while let Ok(job) = receiver.recv() {
        let job_id = job.id();
        debug!(queue = %name, job_id = %job_id, "running job");

        let outcome = job.run();

        let mut s = lock(&stats);
        s.jobs_processed += 1;
        match outcome {
            Outcome::Succeeded => s.jobs_succeeded += 1,
            Outcome::Failed => s.jobs_failed += 1,
            Outcome::Panicked => s.jobs_panicked += 1,
        }
    }

    info!(queue = %name, "job queue worker stopped");
}
