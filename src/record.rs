//! Record definitions
//!
//! A record is one versioned key-value entry as carried by a backup chunk and
//! as stored by a shard engine.

use bincode::Options;
use serde::{Deserialize, Serialize};

use crate::error::{LoadError, Result};

/// A single versioned key-value entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// User key
    pub key: Vec<u8>,

    /// User value
    pub value: Vec<u8>,

    /// Commit version of this entry
    pub version: u64,

    /// Opaque per-entry metadata byte owned by the producer
    pub user_meta: u8,

    /// Expiry as unix seconds (0 = never)
    pub expires_at: u64,
}

impl Record {
    /// Create a record with no user metadata and no expiry
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>, version: u64) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            version,
            user_meta: 0,
            expires_at: 0,
        }
    }

    /// Set the user metadata byte
    pub fn with_user_meta(mut self, user_meta: u8) -> Self {
        self.user_meta = user_meta;
        self
    }

    /// Set the expiry timestamp
    pub fn with_expires_at(mut self, expires_at: u64) -> Self {
        self.expires_at = expires_at;
        self
    }
}

/// Serialization of a record body inside a chunk frame
pub trait RecordCodec {
    /// Serialize a record into a frame body
    fn encode(&self, record: &Record) -> Result<Vec<u8>>;

    /// Deserialize a frame body into a record
    fn decode(&self, bytes: &[u8]) -> Result<Record>;
}

/// bincode-based record codec
///
/// Fixed-width little-endian integers. A body must hold exactly one record:
/// trailing bytes after it are an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

impl BincodeCodec {
    fn options() -> impl Options {
        bincode::DefaultOptions::new()
            .with_fixint_encoding()
            .reject_trailing_bytes()
    }
}

impl RecordCodec for BincodeCodec {
    fn encode(&self, record: &Record) -> Result<Vec<u8>> {
        Self::options()
            .serialize(record)
            .map_err(|e| LoadError::Serialization(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Record> {
        Self::options()
            .deserialize(bytes)
            .map_err(|e| LoadError::Serialization(e.to_string()))
    }
}
