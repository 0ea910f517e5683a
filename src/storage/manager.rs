//! Storage Manager
//!
//! Manages multiple SSTables and coordinates reads/writes.
//!
//! ## Responsibilities
//! - Discover existing SSTables on startup
//! - Resolve versioned reads across every SSTable
//! - Create new SSTables from MemTable flushes
//! - Track SSTable lifecycle

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::config::VersionRetention;
use crate::error::{LoadError, Result};
use crate::memtable::{MemTable, MemTableEntry, VersionedKey};

use super::{SSTable, SSTableBuilder, SSTableReader};

/// Manages the storage layer
///
/// ## Concurrency:
/// - `sstables`: Protected by RwLock (many concurrent readers, exclusive writer)
/// - `next_sstable_id`: Atomic counter (lock-free)
/// - All methods use `&self` (no exclusive access needed)
///
/// Versions of one key can be spread over several SSTables in any order
/// (blind writes do not arrive sorted by version), so lookups consult every
/// table whose key range covers the key.
pub struct StorageManager {
    /// Directory where SSTables are stored
    data_dir: PathBuf,

    /// Open SSTable readers, ordered newest → oldest
    sstables: RwLock<Vec<SSTableReader>>,

    /// Next ID for creating new SSTables (atomic, lock-free)
    next_sstable_id: AtomicU64,
}

impl StorageManager {
    /// Open or create storage in the given directory
    ///
    /// On startup:
    /// 1. Create directory if it doesn't exist
    /// 2. Discover existing SSTable files
    /// 3. Open readers for each (loads indexes into RAM)
    /// 4. Order by ID descending (newest first)
    pub fn open(path: &Path) -> Result<Self> {
        fs::create_dir_all(path)?;

        let mut sstable_ids: Vec<u64> = Vec::new();
        for entry in fs::read_dir(path)? {
            let file_path = entry?.path();
            if file_path.is_file() {
                if let Some(id) = Self::parse_sstable_id(&file_path) {
                    sstable_ids.push(id);
                }
            }
        }

        // Sort newest first (highest ID first)
        sstable_ids.sort_unstable_by(|a, b| b.cmp(a));

        let mut sstables = Vec::with_capacity(sstable_ids.len());
        for id in &sstable_ids {
            let sstable_path = Self::sstable_path_with_dir(path, *id);
            sstables.push(SSTableReader::open(&sstable_path)?);
        }

        // Next ID = max + 1, or 1 if no SSTables exist
        let next_id = sstable_ids.first().map(|&id| id + 1).unwrap_or(1);

        Ok(Self {
            data_dir: path.to_path_buf(),
            sstables: RwLock::new(sstables),
            next_sstable_id: AtomicU64::new(next_id),
        })
    }

    /// Newest version of a key across all SSTables
    pub fn get_latest(&self, key: &[u8]) -> Result<Option<(u64, MemTableEntry)>> {
        self.get_at(key, u64::MAX)
    }

    /// Newest version `<= read_version` of a key across all SSTables
    ///
    /// Note: Uses write lock because SSTableReader lookups move the file
    /// position.
    pub fn get_at(&self, key: &[u8], read_version: u64) -> Result<Option<(u64, MemTableEntry)>> {
        let mut sstables = self.sstables.write();
        let mut best: Option<(u64, MemTableEntry)> = None;

        for reader in sstables.iter_mut() {
            // Skip SSTable if key is outside its range (O(1) check)
            if !reader.might_contain(key) {
                continue;
            }

            match reader.get_at(key, read_version) {
                Ok((version, entry)) => {
                    // Newer tables win ties on the same version
                    if best.as_ref().map_or(true, |(v, _)| version > *v) {
                        best = Some((version, entry));
                    }
                }
                Err(LoadError::KeyNotFound) => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(best)
    }

    /// All stored versions of a key, newest first, without duplicates
    pub fn versions(&self, key: &[u8]) -> Vec<u64> {
        let sstables = self.sstables.read();
        let mut versions: Vec<u64> = sstables
            .iter()
            .filter(|reader| reader.might_contain(key))
            .flat_map(|reader| reader.versions(key))
            .collect();
        versions.sort_unstable_by(|a, b| b.cmp(a));
        versions.dedup();
        versions
    }

    /// Every stored entry, sorted by key then version (newest first)
    ///
    /// Where two tables hold the same `(key, version)`, the newer table wins.
    pub fn entries(&self) -> Result<BTreeMap<VersionedKey, MemTableEntry>> {
        let mut sstables = self.sstables.write();
        let mut merged = BTreeMap::new();

        // Oldest first so newer tables overwrite
        for reader in sstables.iter_mut().rev() {
            for item in reader.iter()? {
                let (key, version, entry) = item?;
                merged.insert((key, Reverse(version)), entry);
            }
        }

        Ok(merged)
    }

    /// Flush a MemTable to a new SSTable
    ///
    /// Creates a new SSTable file from the MemTable's sorted entries, keeping
    /// only the versions allowed by `retention`, opens a reader for it, and
    /// adds it to the front of the list.
    pub fn flush(&self, memtable: &MemTable, retention: VersionRetention) -> Result<SSTable> {
        if memtable.is_empty() {
            return Err(LoadError::Storage(
                "Cannot flush empty MemTable".to_string(),
            ));
        }

        let id = self.next_sstable_id.fetch_add(1, Ordering::SeqCst);
        let path = self.sstable_path(id);

        let mut builder = SSTableBuilder::new(&path)?;
        let mut current_key: Option<Vec<u8>> = None;
        let mut kept_for_key: u32 = 0;
        let mut dropped: u64 = 0;

        // Entries arrive grouped by key, newest version first
        for (key, version, entry) in memtable.iter() {
            if current_key.as_deref() != Some(key.as_slice()) {
                current_key = Some(key.clone());
                kept_for_key = 0;
            }

            if let VersionRetention::Latest(limit) = retention {
                if kept_for_key >= limit {
                    dropped += 1;
                    continue;
                }
            }

            builder.add(&key, version, &entry)?;
            kept_for_key += 1;
        }
        let metadata = builder.finish()?;

        if dropped > 0 {
            tracing::debug!("Dropped {} old versions while writing {}", dropped, path.display());
        }

        let reader = SSTableReader::open(&path)?;
        let mut sstables = self.sstables.write();
        sstables.insert(0, reader);

        Ok(metadata)
    }

    /// Get the number of SSTables
    pub fn sstable_count(&self) -> usize {
        self.sstables.read().len()
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Get the next SSTable ID (for testing/debugging)
    pub fn next_sstable_id(&self) -> u64 {
        self.next_sstable_id.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn sstable_path(&self, id: u64) -> PathBuf {
        Self::sstable_path_with_dir(&self.data_dir, id)
    }

    fn sstable_path_with_dir(dir: &Path, id: u64) -> PathBuf {
        dir.join(format!("sstable_{:06}.sst", id))
    }

    /// "sstable_000042.sst" → Some(42)
    fn parse_sstable_id(path: &Path) -> Option<u64> {
        if path.extension()? != "sst" {
            return None;
        }
        let name = path.file_stem()?.to_string_lossy();
        let id_str = name.strip_prefix("sstable_")?;
        id_str.parse().ok()
    }
}
