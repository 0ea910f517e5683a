//! Shard writer
//!
//! Owns the engine of one freshly created shard for the duration of a chunk.

use std::path::{Path, PathBuf};

use crate::config::EngineConfig;
use crate::engine::{Engine, WriteMode};
use crate::error::{LoadError, Result};

use super::Batch;

/// Directory of shard `index` under `root`
pub fn shard_dir(root: &Path, index: usize) -> PathBuf {
    root.join(format!("shard-{}", index))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    /// Accepting batches
    Open,
    /// Final batch received, waiting for flush
    Sealed,
    /// Flushed; nothing more to do but close
    Flushed,
}

/// Write protocol for one shard: `send`* (last one final) → `flush` → `close`
///
/// Writes are blind: the shard is new and has no other writers. Durability is
/// only guaranteed once `flush` returns.
pub struct ShardWriter {
    shard_index: usize,
    dir: PathBuf,
    /// `None` once closed
    engine: Option<Engine>,
    state: WriterState,
    records_sent: u64,
    batches_sent: u64,
}

impl ShardWriter {
    /// Create the engine for shard `shard_index` under `root`
    ///
    /// `template` supplies every engine setting except the directory.
    pub fn open(root: &Path, shard_index: usize, template: &EngineConfig) -> Result<Self> {
        let dir = shard_dir(root, shard_index);
        let mut config = template.clone();
        config.data_dir = dir.clone();

        let engine = Engine::create(config).map_err(|e| LoadError::StorageOpen {
            path: dir.clone(),
            reason: e.to_string(),
        })?;

        tracing::info!("Created shard {} at {}", shard_index, dir.display());

        Ok(Self {
            shard_index,
            dir,
            engine: Some(engine),
            state: WriterState::Open,
            records_sent: 0,
            batches_sent: 0,
        })
    }

    /// Stage one batch
    ///
    /// Records are applied in order but are not durable until `flush`.
    pub fn send(&mut self, batch: Batch) -> Result<()> {
        if self.state != WriterState::Open {
            return Err(self.write_error("batch received after the final batch"));
        }

        let is_final = batch.is_final();
        let count = batch.len() as u64;

        let engine = match self.engine.as_ref() {
            Some(engine) => engine,
            None => return Err(self.write_error("shard is closed")),
        };
        engine
            .write_batch(batch.into_records(), WriteMode::Blind)
            .map_err(|e| self.write_error(&e.to_string()))?;

        self.records_sent += count;
        self.batches_sent += 1;
        if is_final {
            self.state = WriterState::Sealed;
        }

        tracing::debug!(
            "Shard {}: staged batch {} ({} records, final={})",
            self.shard_index,
            self.batches_sent,
            count,
            is_final
        );

        Ok(())
    }

    /// Make every staged record durable
    ///
    /// Must follow the final batch and may only be called once.
    pub fn flush(&mut self) -> Result<()> {
        match self.state {
            WriterState::Open => return Err(self.flush_error("final batch not yet received")),
            WriterState::Flushed => return Err(self.flush_error("shard already flushed")),
            WriterState::Sealed => {}
        }

        let engine = match self.engine.as_ref() {
            Some(engine) => engine,
            None => return Err(self.flush_error("shard is closed")),
        };
        engine
            .flush()
            .map_err(|e| self.flush_error(&e.to_string()))?;

        self.state = WriterState::Flushed;
        tracing::debug!(
            "Shard {}: flushed {} records",
            self.shard_index,
            self.records_sent
        );

        Ok(())
    }

    /// Release the shard's engine
    pub fn close(mut self) -> Result<()> {
        match self.engine.take() {
            Some(engine) => engine.close(),
            None => Ok(()),
        }
    }

    pub fn shard_index(&self) -> usize {
        self.shard_index
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Records staged so far
    pub fn records_sent(&self) -> u64 {
        self.records_sent
    }

    /// Batches staged so far
    pub fn batches_sent(&self) -> u64 {
        self.batches_sent
    }

    pub fn is_flushed(&self) -> bool {
        self.state == WriterState::Flushed
    }

    fn write_error(&self, reason: &str) -> LoadError {
        LoadError::Write {
            shard: self.shard_index,
            reason: reason.to_string(),
        }
    }

    fn flush_error(&self, reason: &str) -> LoadError {
        LoadError::Flush {
            shard: self.shard_index,
            reason: reason.to_string(),
        }
    }
}

impl Drop for ShardWriter {
    fn drop(&mut self) {
        if let Some(engine) = self.engine.take() {
            if let Err(e) = engine.close() {
                tracing::warn!("Shard {}: close on drop failed: {}", self.shard_index, e);
            }
        }
    }
}
