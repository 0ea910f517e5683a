//! Restore Module
//!
//! Loads backup chunks into freshly created shards.
//!
//! ## Pipeline (one chunk at a time)
//! ```text
//!   Chunk ──► StreamDecoder ──► RecordBatcher ──► ShardWriter ──► shard-N/
//!                  │
//!                  └──► ProgressCounter ◄── ProgressMonitor (optional thread)
//! ```
//!
//! ## Responsibilities
//! - Assign shard indices 0, 1, … in chunk order
//! - Batch records (1000 per batch by default) for blind writes
//! - Flush and close every shard before the next one is opened
//! - Abort the whole run on the first error

mod batcher;
mod orchestrator;
mod progress;
mod writer;

pub use batcher::{Batch, RecordBatcher};
pub use orchestrator::{ChunkObserver, ChunkSummary, RestoreOrchestrator, RestoreSummary};
pub use progress::{
    ProgressCounter, ProgressMonitor, ProgressReport, ProgressSink, StdoutSink,
};
pub use writer::{shard_dir, ShardWriter};
