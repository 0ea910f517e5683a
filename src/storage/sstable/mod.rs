//! SSTable Module
//!
//! Sorted String Table - immutable on-disk sorted storage of versioned entries.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Header (14 bytes)                                       │
//! │   Magic: "SHLD" (4) | Version: u16 (2) | Count: u64 (8) │
//! ├─────────────────────────────────────────────────────────┤
//! │ Data Block (variable)                                   │
//! │   [KeyLen: u32][ValLen: u32][Version: u64][UserMeta: u8]│
//! │   [ExpiresAt: u64][Kind: u8][Key][Value]                │
//! │   ... repeated for each entry ...                       │
//! │   (Kind 1 = value log pointer: Offset u64 + Len u32)    │
//! ├─────────────────────────────────────────────────────────┤
//! │ Index Block (variable)                                  │
//! │   [KeyLen: u32][Version: u64][Offset: u64][Key]         │
//! │   ... repeated for each entry ...                       │
//! ├─────────────────────────────────────────────────────────┤
//! │ Footer (16 bytes)                                       │
//! │   IndexOffset: u64 (8) | DataCRC: u32 (4) | Padding (4) │
//! └─────────────────────────────────────────────────────────┘
//! ```

mod builder;
mod iterator;
mod reader;

use std::path::PathBuf;

use crate::error::{LoadError, Result};
use crate::memtable::MemTableEntry;
use crate::vlog::{ValuePointer, ValueSlot};

pub use builder::SSTableBuilder;
pub use iterator::SSTableIterator;
pub use reader::SSTableReader;

// =============================================================================
// Shared Constants (used by builder, reader, iterator)
// =============================================================================

/// Magic bytes identifying a shard SSTable file
pub(crate) const MAGIC: &[u8; 4] = b"SHLD";

/// Current SSTable format version
pub(crate) const VERSION: u16 = 1;

/// Header size: Magic (4) + Version (2) + EntryCount (8) = 14 bytes
pub(crate) const HEADER_SIZE: u64 = 14;

/// Footer size: IndexOffset (8) + DataCRC (4) + Padding (4) = 16 bytes
pub(crate) const FOOTER_SIZE: u64 = 16;

/// Entry header: KeyLen (4) + ValLen (4) + Version (8) + UserMeta (1) + ExpiresAt (8) + Kind (1)
pub(crate) const ENTRY_HEADER_SIZE: usize = 26;

/// Value kinds
pub(crate) const KIND_INLINE: u8 = 0;
pub(crate) const KIND_POINTER: u8 = 1;

/// Encoded size of a value log pointer
pub(crate) const POINTER_SIZE: usize = 12;

// =============================================================================
// SSTable Metadata
// =============================================================================

/// SSTable metadata returned when a table is written
#[derive(Debug, Clone)]
pub struct SSTable {
    /// Path to the SSTable file
    pub path: PathBuf,
    /// Number of `(key, version)` entries in this SSTable
    pub entry_count: u64,
    /// Smallest key (for range filtering)
    pub min_key: Vec<u8>,
    /// Largest key (for range filtering)
    pub max_key: Vec<u8>,
    /// File size in bytes
    pub file_size: u64,
}

impl SSTable {
    /// Get the number of entries
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Quick check if a key might be in this SSTable (range check)
    /// Returns false if key is definitely outside [min_key, max_key]
    pub fn might_contain(&self, key: &[u8]) -> bool {
        key >= self.min_key.as_slice() && key <= self.max_key.as_slice()
    }
}

// =============================================================================
// Entry Encoding
// =============================================================================

/// Encode the fixed entry header and the value bytes
pub(crate) fn encode_entry(key: &[u8], version: u64, entry: &MemTableEntry) -> (Vec<u8>, Vec<u8>) {
    let (kind, value) = match &entry.value {
        ValueSlot::Inline(v) => (KIND_INLINE, v.clone()),
        ValueSlot::Pointer(p) => {
            let mut bytes = Vec::with_capacity(POINTER_SIZE);
            bytes.extend_from_slice(&p.offset.to_le_bytes());
            bytes.extend_from_slice(&p.len.to_le_bytes());
            (KIND_POINTER, bytes)
        }
    };

    let mut header = Vec::with_capacity(ENTRY_HEADER_SIZE);
    header.extend_from_slice(&(key.len() as u32).to_le_bytes());
    header.extend_from_slice(&(value.len() as u32).to_le_bytes());
    header.extend_from_slice(&version.to_le_bytes());
    header.push(entry.user_meta);
    header.extend_from_slice(&entry.expires_at.to_le_bytes());
    header.push(kind);
    (header, value)
}

/// Fixed fields of an entry header
pub(crate) struct EntryHeader {
    pub key_len: usize,
    pub val_len: usize,
    pub version: u64,
    pub user_meta: u8,
    pub expires_at: u64,
    pub kind: u8,
}

pub(crate) fn decode_entry_header(header: &[u8; ENTRY_HEADER_SIZE]) -> EntryHeader {
    EntryHeader {
        key_len: read_u32(&header[0..4]) as usize,
        val_len: read_u32(&header[4..8]) as usize,
        version: read_u64(&header[8..16]),
        user_meta: header[16],
        expires_at: read_u64(&header[17..25]),
        kind: header[25],
    }
}

/// Rebuild the stored value from its kind and bytes
pub(crate) fn decode_value(header: &EntryHeader, value: Vec<u8>) -> Result<MemTableEntry> {
    let slot = match header.kind {
        KIND_INLINE => ValueSlot::Inline(value),
        KIND_POINTER if value.len() == POINTER_SIZE => ValueSlot::Pointer(ValuePointer {
            offset: read_u64(&value[0..8]),
            len: read_u32(&value[8..12]),
        }),
        kind => {
            return Err(LoadError::Storage(format!(
                "Invalid SSTable value kind {} ({} bytes)",
                kind,
                value.len()
            )))
        }
    };

    Ok(MemTableEntry {
        user_meta: header.user_meta,
        expires_at: header.expires_at,
        value: slot,
    })
}

pub(crate) fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(buf)
}

pub(crate) fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(buf)
}
