//! # shardload
//!
//! Offline restore of a partitioned key-value store from backup chunks:
//! - Length-prefixed record streams decoded lazily, one chunk at a time
//! - Each chunk loaded into its own freshly created shard (`shard-0`, `shard-1`, …)
//! - Batched blind writes, one durable flush per shard
//! - Optional periodic progress reporting
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ChunkSource (directory)                      │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  chunk i
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                 RestoreOrchestrator                          │
//! │     StreamDecoder → RecordBatcher → ShardWriter              │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  shard i
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │  WAL + vlog │          │  MemTable   │
//!   │  (Append)   │          │  (RwLock)   │
//!   └─────────────┘          └──────┬──────┘
//!                                   │ flush
//!                                   ▼
//!                           ┌─────────────┐
//!                           │   Storage   │
//!                           │  (SSTable)  │
//!                           └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod record;

pub mod backup;
pub mod wal;
pub mod memtable;
pub mod vlog;
pub mod storage;
pub mod engine;
pub mod restore;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use backup::{Chunk, ChunkEncoder, ChunkSource, DirectorySource, MemorySource, StreamDecoder};
pub use config::{EngineConfig, RestoreConfig, VersionRetention};
pub use engine::{Engine, WriteMode};
pub use error::{FramePart, LoadError, Result};
pub use record::{BincodeCodec, Record, RecordCodec};
pub use restore::{
    Batch, ChunkObserver, ChunkSummary, ProgressReport, ProgressSink, RecordBatcher,
    RestoreOrchestrator, RestoreSummary, ShardWriter,
};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of shardload
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
