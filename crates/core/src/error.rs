//! Result-code taxonomy shared by every store operation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Outcome of a `get`/`set` against a table file.
///
/// Every failure is reported as a value. Only `Success` means the operation
/// did what was asked; for `set` it also means the file was rewritten before
/// the call returned.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultCode {
    /// The operation completed.
    Success,
    /// The table exists and is valid, but does not contain the key.
    KeyNotFound,
    /// `set` hit an existing key without `duplicate_ok`. The file is untouched.
    KeyCollision,
    /// The table file exists but is not a JSON object. Never repaired.
    DatabaseCorrupt,
    /// Infrastructure failure (directory creation, I/O, worker unavailable).
    DatabaseError,
}

impl ResultCode {
    pub fn is_success(self) -> bool {
        matches!(self, ResultCode::Success)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResultCode::Success => "success",
            ResultCode::KeyNotFound => "key_not_found",
            ResultCode::KeyCollision => "key_collision",
            ResultCode::DatabaseCorrupt => "database_corrupt",
            ResultCode::DatabaseError => "database_error",
        }
    }
}

impl core::fmt::Display for ResultCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An identifier failed to parse.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid identifier: {0}")]
pub struct IdError(pub String);
