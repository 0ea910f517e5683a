//! Backup Module
//!
//! Reading and writing backup chunks.
//!
//! ## Responsibilities
//! - Decode a chunk's framed byte stream into records
//! - Encode records into the same framing
//! - Enumerate the chunks found at a source location
//!
//! ## Chunk Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Frame 1                                 │
//! │ ┌───────────────┬─────────────────────┐ │
//! │ │ Len (8, LE)   │ Record (Len bytes)  │ │
//! │ └───────────────┴─────────────────────┘ │
//! ├─────────────────────────────────────────┤
//! │ Frame 2                                 │
//! │ ┌───────────────┬─────────────────────┐ │
//! │ │ Len (8, LE)   │ Record (Len bytes)  │ │
//! │ └───────────────┴─────────────────────┘ │
//! └─────────────────────────────────────────┘
//!   ... ends with EOF at a frame boundary
//! ```

mod decoder;
mod encoder;
mod source;

pub use decoder::StreamDecoder;
pub use encoder::ChunkEncoder;
pub use source::{Chunk, ChunkIter, ChunkSource, DirectorySource, MemorySource, BACKUP_EXTENSION};

/// Size of the length prefix in front of every record body
pub const LENGTH_PREFIX_SIZE: usize = 8;
