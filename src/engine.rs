//! Engine Module
//!
//! The shard storage engine that coordinates all components.
//!
//! ## Responsibilities
//! - Coordinate WAL, value log, MemTable, and Storage
//! - Apply batches of versioned records, blind or version-checked
//! - Trigger flushes when MemTable is full
//! - Manage crash recovery on startup

use std::cmp::Reverse;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::config::EngineConfig;
use crate::error::{LoadError, Result};
use crate::memtable::{MemTable, MemTableEntry};
use crate::record::Record;
use crate::storage::StorageManager;
use crate::vlog::{ValueLog, ValueSlot};
use crate::wal::{Mutation, WalRecovery, WalWriter};

/// How a batch is checked before it is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Apply as-is; only valid while nothing else writes to the engine
    Blind,

    /// Reject a record whose version is not newer than the key's stored versions
    Checked,
}

/// The shard storage engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (write_batch/flush): Serialized by `write_lock`
///   - Must acquire: write_lock → value log → WAL → memtable → storage
///
/// - **Reads** (get/get_at/entries): No write_lock needed
///   - MemTable uses internal RwLock (many concurrent readers)
///   - StorageManager takes its write lock for SSTable reads
///     (SSTableReader lookups move the file position)
pub struct Engine {
    /// Engine configuration
    config: EngineConfig,

    /// Directory for all SSTables
    storage_dir: PathBuf,

    /// Write-ahead log for staged batches
    wal: Mutex<WalWriter>,

    /// Value log for values at or above the threshold
    vlog: Mutex<ValueLog>,

    /// In-memory table for recent writes (internal RwLock)
    memtable: MemTable,

    /// Persistent storage manager (internal RwLock on sstables vec)
    storage: StorageManager,

    /// Serializes write operations
    write_lock: Mutex<()>,
}

impl Engine {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const WAL_FILENAME: &'static str = "wal.log";
    const VLOG_FILENAME: &'static str = "values.vlog";
    const SSTABLE_DIR: &'static str = "sstables";

    /// Create an engine in a directory that is missing or empty
    pub fn create(config: EngineConfig) -> Result<Self> {
        if config.data_dir.exists() {
            let occupied = fs::read_dir(&config.data_dir)?.next().is_some();
            if occupied {
                return Err(LoadError::Storage(format!(
                    "{} already contains data",
                    config.data_dir.display()
                )));
            }
        }

        Self::open(config)
    }

    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Open/create data directory
    /// 2. Load existing SSTables
    /// 3. Recover from WAL if it exists, flush and truncate it
    /// 4. Ready to serve requests
    pub fn open(config: EngineConfig) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;

        let storage_dir = config.data_dir.join(Self::SSTABLE_DIR);
        let wal_path = config.data_dir.join(Self::WAL_FILENAME);
        let vlog_path = config.data_dir.join(Self::VLOG_FILENAME);

        fs::create_dir_all(&storage_dir)?;

        let storage = StorageManager::open(&storage_dir)?;
        let memtable = MemTable::new();
        let vlog = ValueLog::open(&vlog_path, config.sync_writes)?;

        let mut next_lsn = 1;
        let mut recovered = false;

        if wal_path.exists() {
            let (entries, recovery_result) = WalRecovery::recover(&wal_path)?;

            if recovery_result.entries_recovered > 0 || recovery_result.entries_corrupted > 0 {
                tracing::warn!(
                    "WAL recovery in {}: {} entries recovered, {} corrupted, last_lsn={}",
                    config.data_dir.display(),
                    recovery_result.entries_recovered,
                    recovery_result.entries_corrupted,
                    recovery_result.last_lsn
                );
            }
            next_lsn = recovery_result.last_lsn + 1;

            for entry in entries {
                for mutation in entry.mutations {
                    memtable.put(mutation.key, mutation.version, mutation.entry);
                }
            }

            // Make recovered data durable before the WAL is truncated
            if !memtable.is_empty() {
                tracing::info!(
                    "Flushing {} recovered entries to SSTable",
                    memtable.entry_count()
                );
                storage.flush(&memtable, config.version_retention)?;
                memtable.clear();
                recovered = true;
            }
        }

        let mut wal = WalWriter::open(&wal_path, config.sync_writes, next_lsn)?;
        if recovered {
            wal.truncate()?;
        }

        Ok(Self {
            config,
            storage_dir,
            wal: Mutex::new(wal),
            vlog: Mutex::new(vlog),
            memtable,
            storage,
            write_lock: Mutex::new(()),
        })
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Apply a batch of records in order
    ///
    /// Steps:
    /// 1. Acquire write lock
    /// 2. Check versions (`Checked` mode only)
    /// 3. Move large values to the value log
    /// 4. Append the batch to the WAL
    /// 5. Insert into the MemTable, flushing if it is full
    ///
    /// Nothing is forced to disk unless `sync_writes` is set; call
    /// [`Engine::flush`] for durability.
    pub fn write_batch(&self, records: Vec<Record>, mode: WriteMode) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let _write_guard = self.write_lock.lock();

        if mode == WriteMode::Checked {
            self.check_versions(&records)?;
        }

        let mut mutations = Vec::with_capacity(records.len());
        {
            let mut vlog = self.vlog.lock();
            for record in records {
                let value = if record.value.len() >= self.config.value_threshold {
                    ValueSlot::Pointer(vlog.append(&record.value)?)
                } else {
                    ValueSlot::Inline(record.value)
                };

                mutations.push(Mutation {
                    key: record.key,
                    version: record.version,
                    entry: MemTableEntry {
                        user_meta: record.user_meta,
                        expires_at: record.expires_at,
                        value,
                    },
                });
            }
        }

        self.wal.lock().append(&mutations)?;

        let mut size = self.memtable.size();
        for mutation in mutations {
            size = self.memtable.put(mutation.key, mutation.version, mutation.entry);
        }

        if size >= self.config.memtable_size_limit {
            self.flush_internal()?;
        }

        Ok(())
    }

    /// Put a single version of a key, rejecting stale versions
    pub fn put(&self, key: &[u8], value: &[u8], version: u64) -> Result<()> {
        self.write_batch(vec![Record::new(key, value, version)], WriteMode::Checked)
    }

    /// Flush staged writes to disk
    ///
    /// Syncs the value log, writes the MemTable as an SSTable, and truncates
    /// the WAL. All data written before this call is durable when it returns.
    pub fn flush(&self) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        self.flush_internal()
    }

    /// Internal flush implementation (called with write lock held)
    fn flush_internal(&self) -> Result<()> {
        // SSTables may point into the value log; it must be durable first
        self.vlog.lock().sync()?;

        if self.memtable.is_empty() {
            return Ok(());
        }

        let table = self
            .storage
            .flush(&self.memtable, self.config.version_retention)?;
        tracing::debug!(
            "Wrote {} ({} entries, {} bytes)",
            table.path.display(),
            table.entry_count,
            table.file_size
        );

        self.memtable.clear();

        // Entries are now durable in the SSTable
        self.wal.lock().truncate()?;

        Ok(())
    }

    /// Close the engine
    ///
    /// Releases file handles after handing buffered bytes to the OS. Does not
    /// flush the MemTable or fsync; staged data not covered by a previous
    /// `flush` is only recoverable from the WAL.
    pub fn close(self) -> Result<()> {
        self.wal.lock().flush_buffer()?;
        self.vlog.lock().flush_buffer()?;
        tracing::debug!("Closed engine at {}", self.config.data_dir.display());
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Newest version of a key
    pub fn get(&self, key: &[u8]) -> Result<Option<Record>> {
        self.get_at(key, u64::MAX)
    }

    /// Newest version of a key that is `<= read_version`
    ///
    /// Search order: MemTable, then every SSTable; the highest version wins.
    pub fn get_at(&self, key: &[u8], read_version: u64) -> Result<Option<Record>> {
        let in_memory = self.memtable.get_at(key, read_version);
        let on_disk = self.storage.get_at(key, read_version)?;

        let best = match (in_memory, on_disk) {
            (Some(mem), Some(disk)) => Some(if disk.0 > mem.0 { disk } else { mem }),
            (mem, disk) => mem.or(disk),
        };

        match best {
            Some((version, entry)) => {
                let mut vlog = self.vlog.lock();
                Ok(Some(Self::resolve(&mut vlog, key.to_vec(), version, entry)?))
            }
            None => Ok(None),
        }
    }

    /// All stored versions of a key, newest first
    pub fn versions(&self, key: &[u8]) -> Vec<u64> {
        let mut versions = self.memtable.versions(key);
        versions.extend(self.storage.versions(key));
        versions.sort_unstable_by(|a, b| b.cmp(a));
        versions.dedup();
        versions
    }

    /// Every stored entry, sorted by key then version (newest first)
    pub fn entries(&self) -> Result<Vec<Record>> {
        let mut merged = self.storage.entries()?;
        for (key, version, entry) in self.memtable.iter() {
            merged.insert((key, Reverse(version)), entry);
        }

        let mut vlog = self.vlog.lock();
        merged
            .into_iter()
            .map(|((key, Reverse(version)), entry)| Self::resolve(&mut vlog, key, version, entry))
            .collect()
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the storage directory path (where SSTables are stored)
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Get the current memtable size
    pub fn memtable_size(&self) -> usize {
        self.memtable.size()
    }

    /// Get the memtable entry count
    pub fn memtable_entry_count(&self) -> usize {
        self.memtable.entry_count()
    }

    /// Get the number of SSTables
    pub fn sstable_count(&self) -> usize {
        self.storage.sstable_count()
    }

    /// Get the value log size in bytes
    pub fn value_log_size(&self) -> u64 {
        self.vlog.lock().size()
    }

    /// Get the configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Reject records that do not advance their key's version
    fn check_versions(&self, records: &[Record]) -> Result<()> {
        let mut batch_latest: HashMap<&[u8], u64> = HashMap::new();

        for record in records {
            let latest = match batch_latest.get(record.key.as_slice()) {
                Some(&version) => Some(version),
                None => self.latest_version(&record.key)?,
            };

            if let Some(latest) = latest {
                if record.version <= latest {
                    return Err(LoadError::VersionConflict {
                        version: record.version,
                        latest,
                    });
                }
            }

            batch_latest.insert(record.key.as_slice(), record.version);
        }

        Ok(())
    }

    fn latest_version(&self, key: &[u8]) -> Result<Option<u64>> {
        let in_memory = self.memtable.get_latest(key).map(|(v, _)| v);
        let on_disk = self.storage.get_latest(key)?.map(|(v, _)| v);
        Ok(in_memory.max(on_disk))
    }

    /// Turn a stored entry back into a record, reading the value log if needed
    fn resolve(vlog: &mut ValueLog, key: Vec<u8>, version: u64, entry: MemTableEntry) -> Result<Record> {
        let value = match entry.value {
            ValueSlot::Inline(value) => value,
            ValueSlot::Pointer(pointer) => vlog.read(pointer)?,
        };

        Ok(Record {
            key,
            value,
            version,
            user_meta: entry.user_meta,
            expires_at: entry.expires_at,
        })
    }
}
