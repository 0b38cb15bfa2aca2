//! Key-value operations over table files, serialized through a [`JobQueue`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error};

use jsondb_core::ResultCode;

use super::table::{self, TableError};
use crate::config::StoreConfig;
use crate::jobs::{JobQueue, QueueError};

/// JSON table store.
///
/// Every `get`/`set` is one job on the queue: the read-check-write sequence of
/// a `set` is never split, and no two operations overlap, whatever tables they
/// touch. Keys are strings, as in any JSON object.
///
/// Cheap to clone; clones share the queue.
#[derive(Debug, Clone)]
pub struct JsonStore {
    root: Arc<PathBuf>,
    queue: Arc<JobQueue>,
}

impl JsonStore {
    /// Start a dedicated queue and open the store on `config.root`.
    pub fn open(config: StoreConfig) -> Result<Self, QueueError> {
        let queue = JobQueue::start(config.queue)?;
        Ok(Self::with_queue(config.root, Arc::new(queue)))
    }

    /// Open the store on an existing queue, e.g. one shared with other stores.
    pub fn with_queue(root: impl Into<PathBuf>, queue: Arc<JobQueue>) -> Self {
        Self {
            root: Arc::new(root.into()),
            queue,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn queue(&self) -> &Arc<JobQueue> {
        &self.queue
    }

    /// Read `key` from `table`.
    ///
    /// Creates the table (as `{}`) if it does not exist yet.
    pub fn get(&self, table: &str, key: &str) -> (Option<Value>, ResultCode) {
        let root = self.root.clone();
        let table_name = table.to_string();
        let key = key.to_string();

        let outcome = self.queue.run(move || Ok(get_value(&root, &table_name, &key)));

        match outcome {
            Ok(found) => found,
            Err(e) => (None, self.unavailable(table, e)),
        }
    }

    /// Write `key → value` into `table`.
    ///
    /// Without `duplicate_ok` an existing key is left alone and
    /// `KeyCollision` is returned. On `Success` the whole file has been
    /// rewritten.
    pub fn set(&self, table: &str, key: &str, value: Value, duplicate_ok: bool) -> ResultCode {
        let root = self.root.clone();
        let table_name = table.to_string();
        let key = key.to_string();

        let outcome = self
            .queue
            .run(move || Ok(set_value(&root, &table_name, key, value, duplicate_ok)));

        outcome.unwrap_or_else(|e| self.unavailable(table, e))
    }

    /// `set` that refuses to overwrite.
    pub fn insert(&self, table: &str, key: &str, value: Value) -> ResultCode {
        self.set(table, key, value, false)
    }

    /// `set` that overwrites.
    pub fn upsert(&self, table: &str, key: &str, value: Value) -> ResultCode {
        self.set(table, key, value, true)
    }

    /// Stop the underlying queue after draining pending operations.
    pub fn shutdown(&self) {
        self.queue.shutdown();
    }

    fn unavailable(&self, table: &str, e: QueueError) -> ResultCode {
        error!(queue = %self.queue.name(), table, error = %e, "store operation did not complete");
        ResultCode::DatabaseError
    }
}

fn get_value(root: &Path, table: &str, key: &str) -> (Option<Value>, ResultCode) {
    let content = match load(root, table) {
        Ok((_, content)) => content,
        Err(code) => return (None, code),
    };

    match content.get(key).cloned() {
        Some(value) => (Some(value), ResultCode::Success),
        None => {
            debug!(table, key, "key not found");
            (None, ResultCode::KeyNotFound)
        }
    }
}

fn set_value(
    root: &Path,
    table: &str,
    key: String,
    value: Value,
    duplicate_ok: bool,
) -> ResultCode {
    let (path, mut content) = match load(root, table) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };

    if !duplicate_ok && content.contains_key(&key) {
        debug!(table, key = %key, "key collision");
        return ResultCode::KeyCollision;
    }

    content.insert(key, value);
    match table::write_object(&path, &content) {
        Ok(()) => ResultCode::Success,
        Err(e) => report(table, e),
    }
}

fn load(root: &Path, table: &str) -> Result<(PathBuf, table::Table), ResultCode> {
    let path = table::resolve(root, table).map_err(|e| report(table, e))?;
    let content = table::ensure_exists(&path).map_err(|e| report(table, e))?;
    Ok((path, content))
}

fn report(table: &str, e: TableError) -> ResultCode {
    let code = e.result_code();
    error!(table, result = %code, error = %e, "table unavailable");
    code
}
