//! Serialized background job execution.
//!
//! ## Design
//!
//! - One FIFO, one worker thread: jobs never overlap
//! - Callers block on a condition variable, not a spin loop
//! - Errors and panics inside a job are captured and handed to the waiter
//! - Explicit lifecycle: `start`, `shutdown` (drain + join)
//!
//! ## Components
//!
//! - `JobQueue`: owns the worker and the FIFO
//! - `JobHandle`: per-job status and result slot
//! - `JobStatus`: `Queued → Running → Complete`

pub mod executor;
pub mod types;

pub use executor::{JobQueue, QueueConfig, QueueStats};
pub use types::{JobError, JobHandle, JobRecord, JobStatus, QueueError};
