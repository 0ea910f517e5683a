//! Configuration for shardload
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{LoadError, Result};

/// Default number of records per batch
pub const DEFAULT_BATCH_CAPACITY: usize = 1000;

/// Default values at or above this size go to the value log
pub const DEFAULT_VALUE_THRESHOLD: usize = 1 << 10;

/// Default interval between progress reports
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

// =============================================================================
// Engine Configuration
// =============================================================================

/// Configuration for a single shard engine instance
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Root directory for all shard files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── wal.log          (write-ahead log)
    ///     ├── values.vlog      (value log for large values)
    ///     └── sstables/        (SSTable files)
    pub data_dir: PathBuf,

    /// fsync the WAL and value log after every write
    pub sync_writes: bool,

    /// Values of at least this many bytes are stored in the value log
    pub value_threshold: usize,

    /// How many versions per key survive a memtable flush
    pub version_retention: VersionRetention,

    /// Max size of memtable before flush (in bytes)
    pub memtable_size_limit: usize,
}

/// Version retention policy applied when a memtable becomes an SSTable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionRetention {
    /// Keep every version
    Unbounded,

    /// Keep only the newest `n` versions of each key
    Latest(u32),
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./shardload_data"),
            sync_writes: false,
            value_threshold: DEFAULT_VALUE_THRESHOLD,
            version_retention: VersionRetention::Unbounded,
            memtable_size_limit: 64 * 1024 * 1024, // 64 MB
        }
    }
}

impl EngineConfig {
    /// Create a new config builder
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Bulk-load settings: no per-write sync, 1 KiB value threshold,
    /// every version retained.
    pub fn bulk_load(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            sync_writes: false,
            value_threshold: DEFAULT_VALUE_THRESHOLD,
            version_retention: VersionRetention::Unbounded,
            ..Self::default()
        }
    }
}

/// Builder for EngineConfig
#[derive(Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Set the data directory (root for all shard files)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Enable or disable fsync after every write
    pub fn sync_writes(mut self, sync: bool) -> Self {
        self.config.sync_writes = sync;
        self
    }

    /// Set the value log threshold (in bytes)
    pub fn value_threshold(mut self, bytes: usize) -> Self {
        self.config.value_threshold = bytes;
        self
    }

    /// Set the version retention policy
    pub fn version_retention(mut self, retention: VersionRetention) -> Self {
        self.config.version_retention = retention;
        self
    }

    /// Set the memtable size limit (in bytes)
    pub fn memtable_size_limit(mut self, size: usize) -> Self {
        self.config.memtable_size_limit = size;
        self
    }

    pub fn build(self) -> EngineConfig {
        self.config
    }
}

// =============================================================================
// Restore Configuration
// =============================================================================

/// Configuration for a restore run
#[derive(Debug, Clone)]
pub struct RestoreConfig {
    /// Source location of the backup chunks
    pub location: String,

    /// Directory receiving the `shard-N` directories
    pub postings_dir: PathBuf,

    /// Run a progress monitor while each chunk loads
    pub progress: bool,

    /// Interval between progress reports
    pub progress_interval: Duration,

    /// Records per batch sent to a shard
    pub batch_capacity: usize,

    /// Engine settings applied to every shard (`data_dir` is replaced per shard)
    pub engine: EngineConfig,
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            location: String::new(),
            postings_dir: PathBuf::from("./p"),
            progress: false,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            batch_capacity: DEFAULT_BATCH_CAPACITY,
            engine: EngineConfig::bulk_load("."),
        }
    }
}

impl RestoreConfig {
    /// Create a new config builder
    pub fn builder() -> RestoreConfigBuilder {
        RestoreConfigBuilder::default()
    }

    /// Check the settings a run cannot proceed without
    pub fn validate(&self) -> Result<()> {
        if self.location.trim().is_empty() {
            return Err(LoadError::Config("source location is required".to_string()));
        }
        if self.postings_dir.as_os_str().is_empty() {
            return Err(LoadError::Config("postings directory is required".to_string()));
        }
        if self.batch_capacity == 0 {
            return Err(LoadError::Config("batch capacity must be positive".to_string()));
        }
        if self.progress && self.progress_interval.is_zero() {
            return Err(LoadError::Config("progress interval must be positive".to_string()));
        }
        Ok(())
    }
}

/// Builder for RestoreConfig
#[derive(Default)]
pub struct RestoreConfigBuilder {
    config: RestoreConfig,
}

impl RestoreConfigBuilder {
    /// Set the source location
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.config.location = location.into();
        self
    }

    /// Set the postings directory (parent of all shard directories)
    pub fn postings_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.postings_dir = path.into();
        self
    }

    /// Enable or disable progress reporting
    pub fn progress(mut self, enabled: bool) -> Self {
        self.config.progress = enabled;
        self
    }

    /// Set the progress report interval
    pub fn progress_interval(mut self, interval: Duration) -> Self {
        self.config.progress_interval = interval;
        self
    }

    /// Set the batch capacity
    pub fn batch_capacity(mut self, capacity: usize) -> Self {
        self.config.batch_capacity = capacity;
        self
    }

    /// Set the engine template used for every shard
    pub fn engine(mut self, engine: EngineConfig) -> Self {
        self.config.engine = engine;
        self
    }

    pub fn build(self) -> RestoreConfig {
        self.config
    }
}
