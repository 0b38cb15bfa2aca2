//! File-backed JSON tables.

pub mod kv;
pub mod table;

pub use kv::JsonStore;
pub use table::{Table, TableError};
