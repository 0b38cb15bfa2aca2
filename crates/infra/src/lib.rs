//! Infrastructure layer: the job queue, table files, the key-value store.

pub mod config;
pub mod jobs;
pub mod store;


pub use config::StoreConfig;
pub use jobs::{JobQueue, QueueConfig};
pub use store::JsonStore;
