//! MemTable Module
//!
//! In-memory data structure for recent writes.
//!
//! ## Responsibilities
//! - Fast reads and writes in memory
//! - Keep every version of a key, newest first
//! - Track size for flush triggers
//! - Ordered iteration for SSTable creation
//!
//! ## Data Structure Choice
//! BTreeMap keyed by `(key, Reverse(version))` wrapped in an RwLock:
//! - Keys sorted ascending, versions of one key sorted newest first
//! - A range over one key yields its version history in order

mod table;

use std::cmp::Reverse;

use serde::{Deserialize, Serialize};

use crate::vlog::ValueSlot;

pub use table::{MemTable, MemTableIterator};

/// Sort key shared by the memtable and SSTable indexes
pub type VersionedKey = (Vec<u8>, Reverse<u64>);

/// Everything stored for one `(key, version)` besides the key itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemTableEntry {
    /// Producer-owned metadata byte
    pub user_meta: u8,

    /// Expiry as unix seconds (0 = never)
    pub expires_at: u64,

    /// Inline value or value log pointer
    pub value: ValueSlot,
}

impl MemTableEntry {
    /// Approximate in-memory footprint, excluding the key
    pub fn footprint(&self) -> usize {
        // user_meta + expires_at + slot tag
        10 + self.value.footprint()
    }
}
