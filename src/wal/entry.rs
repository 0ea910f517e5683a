//! WAL Entry definitions
//!
//! Defines the structure of individual WAL log entries.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{LoadError, Result};
use crate::memtable::MemTableEntry;

/// Header size: LSN (8) + CRC (4) + Len (4)
pub const HEADER_SIZE: usize = 16;

/// A single entry in the WAL: one applied batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// The writes applied by this batch, in order
    pub mutations: Vec<Mutation>,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,
}

/// One staged `(key, version)` write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mutation {
    pub key: Vec<u8>,
    pub version: u64,
    pub entry: MemTableEntry,
}

/// Borrowed twin of `WalEntry` so appends serialize without cloning values
#[derive(Serialize)]
struct WalEntryRef<'a> {
    lsn: u64,
    mutations: &'a [Mutation],
    timestamp: u64,
}

impl WalEntry {
    /// Create an entry stamped with the current time
    pub fn new(lsn: u64, mutations: Vec<Mutation>) -> Self {
        Self {
            lsn,
            mutations,
            timestamp: now_millis(),
        }
    }

    /// Serialize to the on-disk frame: header + bincode data
    pub fn serialize(&self) -> Result<Vec<u8>> {
        Self::encode(self.lsn, &self.mutations, self.timestamp)
    }

    /// Frame a batch of mutations without taking ownership of them
    pub(crate) fn encode(lsn: u64, mutations: &[Mutation], timestamp: u64) -> Result<Vec<u8>> {
        let data = bincode::serialize(&WalEntryRef {
            lsn,
            mutations,
            timestamp,
        })
        .map_err(|e| LoadError::Serialization(e.to_string()))?;

        let len = u32::try_from(data.len()).map_err(|_| {
            LoadError::Serialization(format!("WAL entry of {} bytes is too large", data.len()))
        })?;
        let crc = crc32fast::hash(&data);

        let mut frame = Vec::with_capacity(HEADER_SIZE + data.len());
        frame.extend_from_slice(&lsn.to_le_bytes());
        frame.extend_from_slice(&crc.to_le_bytes());
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&data);
        Ok(frame)
    }

    /// Parse a full frame, verifying its checksum and LSN
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(LoadError::WalCorruption(format!(
                "Incomplete header: expected {} bytes, got {}",
                HEADER_SIZE,
                bytes.len()
            )));
        }

        let (lsn, crc, len) = parse_header(&bytes[..HEADER_SIZE]);
        let data = &bytes[HEADER_SIZE..];
        if data.len() != len as usize {
            return Err(LoadError::WalCorruption(format!(
                "Entry {}: expected {} data bytes, got {}",
                lsn,
                len,
                data.len()
            )));
        }

        Self::from_parts(lsn, crc, data)
    }

    /// Verify and decode the data section of a frame
    pub(crate) fn from_parts(lsn: u64, crc: u32, data: &[u8]) -> Result<Self> {
        if crc32fast::hash(data) != crc {
            return Err(LoadError::WalCorruption(format!("Entry {}: CRC mismatch", lsn)));
        }

        let entry: WalEntry = bincode::deserialize(data)
            .map_err(|e| LoadError::WalCorruption(format!("Entry {}: {}", lsn, e)))?;

        if entry.lsn != lsn {
            return Err(LoadError::WalCorruption(format!(
                "Header LSN {} does not match entry LSN {}",
                lsn, entry.lsn
            )));
        }

        Ok(entry)
    }

    /// Total frame size on disk
    pub fn frame_len(data_len: u32) -> u64 {
        HEADER_SIZE as u64 + data_len as u64
    }
}

/// Split a header into (lsn, crc, data length)
pub(crate) fn parse_header(header: &[u8]) -> (u64, u32, u32) {
    let mut lsn = [0u8; 8];
    lsn.copy_from_slice(&header[0..8]);
    let mut crc = [0u8; 4];
    crc.copy_from_slice(&header[8..12]);
    let mut len = [0u8; 4];
    len.copy_from_slice(&header[12..16]);
    (
        u64::from_le_bytes(lsn),
        u32::from_le_bytes(crc),
        u32::from_le_bytes(len),
    )
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
