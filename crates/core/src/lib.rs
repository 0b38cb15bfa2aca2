//! `jsondb-core` — shared building blocks for the JSON table store.
//!
//! This crate contains **pure** types (no filesystem, no threads): the
//! result-code taxonomy every store operation reports, and the identifiers
//! used by the job queue.

pub mod error;
pub mod id;

pub use error::{IdError, ResultCode};
pub use id::JobId;
