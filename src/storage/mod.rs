//! Storage Module
//!
//! Persistent storage layer using an SSTable-like format.
//!
//! ## Responsibilities
//! - Persist memtable contents to disk in sorted format
//! - Versioned point lookups across all tables
//! - Apply the version retention policy when a memtable is written
//!
//! ## File Format
//! See the `sstable` submodule for the on-disk layout of a single table.

mod sstable;
mod manager;

pub use sstable::{SSTable, SSTableBuilder, SSTableIterator, SSTableReader};
pub use manager::StorageManager;
