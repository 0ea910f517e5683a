//! Value Log Module
//!
//! Append-only storage for large values. The memtable, WAL and SSTables hold
//! a small pointer instead of the value itself.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Value 1                                 │
//! │ ┌─────────┬─────────┬─────────────────┐ │
//! │ │ Len (4) │ CRC (4) │ Value bytes     │ │
//! │ └─────────┴─────────┴─────────────────┘ │
//! ├─────────────────────────────────────────┤
//! │ Value 2 ...                             │
//! └─────────────────────────────────────────┘
//! ```

mod log;

use serde::{Deserialize, Serialize};

pub use log::ValueLog;

/// Size of the per-value header: Len (4) + CRC (4)
pub const VALUE_HEADER_SIZE: u64 = 8;

/// Location of a value inside the value log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValuePointer {
    /// Offset of the value header
    pub offset: u64,

    /// Length of the value bytes
    pub len: u32,
}

/// Where a stored value lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueSlot {
    /// The value is stored next to its key
    Inline(Vec<u8>),

    /// The value is stored in the value log
    Pointer(ValuePointer),
}

impl ValueSlot {
    /// Bytes this slot occupies next to its key
    pub fn footprint(&self) -> usize {
        match self {
            ValueSlot::Inline(value) => value.len(),
            ValueSlot::Pointer(_) => 12,
        }
    }
}
