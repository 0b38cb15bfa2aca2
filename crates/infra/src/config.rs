//! Store configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::jobs::QueueConfig;

/// Directory tables are resolved against unless configured otherwise.
pub const DEFAULT_ROOT: &str = "db/";

/// Configuration for [`JsonStore::open`](crate::store::JsonStore::open).
///
/// No environment variables are read here; embedding applications decide how
/// to override the defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Root directory for table files, relative to the working directory
    pub root: PathBuf,
    /// Worker queue settings
    pub queue: QueueConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_ROOT),
            queue: QueueConfig::default(),
        }
    }
}

impl StoreConfig {
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn with_queue(mut self, queue: QueueConfig) -> Self {
        self.queue = queue;
        self
    }
}
