//! Error types for shardload
//!
//! Provides a unified error type for the restore pipeline and the shard engine.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using LoadError
pub type Result<T> = std::result::Result<T, LoadError>;

/// Which part of a chunk frame a short read hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePart {
    /// The 8-byte length prefix
    LengthPrefix,

    /// The serialized record body
    Body,
}

impl fmt::Display for FramePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FramePart::LengthPrefix => f.write_str("length prefix"),
            FramePart::Body => f.write_str("record body"),
        }
    }
}

/// Unified error type for shardload operations
#[derive(Debug, Error)]
pub enum LoadError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Backup Stream Errors
    // -------------------------------------------------------------------------
    #[error(
        "Stream corruption at record {record}: expected {expected} bytes of {part}, got {actual}"
    )]
    StreamCorruption {
        record: u64,
        part: FramePart,
        expected: u64,
        actual: u64,
    },

    #[error("Deserialization error at record {record}: {reason}")]
    Deserialization { record: u64, reason: String },

    #[error("Chunk enumeration failed: {0}")]
    Enumeration(String),

    // -------------------------------------------------------------------------
    // Shard Errors
    // -------------------------------------------------------------------------
    #[error("Failed to open shard at {}: {reason}", path.display())]
    StorageOpen { path: PathBuf, reason: String },

    #[error("Write to shard {shard} failed: {reason}")]
    Write { shard: usize, reason: String },

    #[error("Flush of shard {shard} failed: {reason}")]
    Flush { shard: usize, reason: String },

    // -------------------------------------------------------------------------
    // Engine Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Key not found")]
    KeyNotFound,

    #[error("Version conflict: version {version} is not newer than stored version {latest}")]
    VersionConflict { version: u64, latest: u64 },

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}
