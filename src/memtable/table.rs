//! MemTable implementation
//!
//! BTreeMap-based memtable with RwLock for concurrency.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

use super::{MemTableEntry, VersionedKey};

/// Per-entry bookkeeping overhead counted towards the size limit
const ENTRY_OVERHEAD: usize = 8;

/// In-memory table for recent writes
pub struct MemTable {
    data: RwLock<BTreeMap<VersionedKey, MemTableEntry>>,
    /// Approximate size in bytes
    size: AtomicUsize,
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            size: AtomicUsize::new(0),
        }
    }

    /// Insert one version of a key, replacing the same version if present
    ///
    /// Returns the approximate table size after the insert.
    pub fn put(&self, key: Vec<u8>, version: u64, entry: MemTableEntry) -> usize {
        let added = Self::entry_size(&key, &entry);
        let mut data = self.data.write();

        let removed = data
            .insert((key.clone(), Reverse(version)), entry)
            .map(|old| Self::entry_size(&key, &old))
            .unwrap_or(0);

        if removed > 0 {
            self.size.fetch_sub(removed, Ordering::SeqCst);
        }
        self.size.fetch_add(added, Ordering::SeqCst) + added
    }

    /// Newest version of a key
    pub fn get_latest(&self, key: &[u8]) -> Option<(u64, MemTableEntry)> {
        self.get_at(key, u64::MAX)
    }

    /// Newest version of a key that is `<= read_version`
    pub fn get_at(&self, key: &[u8], read_version: u64) -> Option<(u64, MemTableEntry)> {
        let data = self.data.read();
        let from = (key.to_vec(), Reverse(read_version));
        let to = (key.to_vec(), Reverse(0));
        data.range(from..=to)
            .next()
            .map(|((_, Reverse(version)), entry)| (*version, entry.clone()))
    }

    /// All versions of a key, newest first
    pub fn versions(&self, key: &[u8]) -> Vec<u64> {
        let data = self.data.read();
        let from = (key.to_vec(), Reverse(u64::MAX));
        let to = (key.to_vec(), Reverse(0));
        data.range(from..=to)
            .map(|((_, Reverse(version)), _)| *version)
            .collect()
    }

    /// Get approximate size in bytes
    pub fn size(&self) -> usize {
        self.size.load(Ordering::SeqCst)
    }

    /// Number of `(key, version)` entries
    pub fn entry_count(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Check if should flush (size >= limit)
    pub fn should_flush(&self, size_limit: usize) -> bool {
        self.size() >= size_limit
    }

    /// Snapshot iterator in `(key asc, version desc)` order
    pub fn iter(&self) -> MemTableIterator {
        let data = self.data.read();
        let entries: Vec<_> = data
            .iter()
            .map(|((key, Reverse(version)), entry)| (key.clone(), *version, entry.clone()))
            .collect();
        MemTableIterator {
            inner: entries.into_iter(),
        }
    }

    /// Clear all entries (after successful flush)
    pub fn clear(&self) {
        let mut data = self.data.write();
        data.clear();
        self.size.store(0, Ordering::SeqCst);
    }

    fn entry_size(key: &[u8], entry: &MemTableEntry) -> usize {
        key.len() + 8 + entry.footprint() + ENTRY_OVERHEAD
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over a snapshot of MemTable entries
pub struct MemTableIterator {
    inner: std::vec::IntoIter<(Vec<u8>, u64, MemTableEntry)>,
}

impl Iterator for MemTableIterator {
    type Item = (Vec<u8>, u64, MemTableEntry);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}
