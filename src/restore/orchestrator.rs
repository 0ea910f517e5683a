//! Restore orchestrator
//!
//! Drives the pipeline over every chunk of a source, strictly one chunk at a
//! time, and aborts on the first error.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::backup::{Chunk, ChunkSource, DirectorySource, StreamDecoder};
use crate::config::RestoreConfig;
use crate::error::Result;

use super::batcher::RecordBatcher;
use super::progress::{ProgressCounter, ProgressMonitor, ProgressSink, StdoutSink};
use super::writer::ShardWriter;

/// Outcome of loading one chunk into its shard
#[derive(Debug, Clone)]
pub struct ChunkSummary {
    /// Name of the chunk
    pub name: String,

    /// Shard the chunk was loaded into
    pub shard_index: usize,

    /// Directory of that shard
    pub shard_dir: PathBuf,

    /// Records written
    pub records: u64,

    /// Batches sent to the shard
    pub batches: u64,

    /// Time from opening the shard to the end of its flush
    pub elapsed: Duration,

    /// When the shard's flush returned
    pub flushed_at: Instant,
}

impl fmt::Display for ChunkSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Loaded {} keys from {} into shard {} ({}) in {:.2}s",
            self.records,
            self.name,
            self.shard_index,
            self.shard_dir.display(),
            self.elapsed.as_secs_f64()
        )
    }
}

/// Outcome of a complete restore run
#[derive(Debug, Clone, Default)]
pub struct RestoreSummary {
    /// One entry per chunk, in shard order
    pub chunks: Vec<ChunkSummary>,
}

impl RestoreSummary {
    /// Records written across every shard
    pub fn total_records(&self) -> u64 {
        self.chunks.iter().map(|c| c.records).sum()
    }
}

/// Receives each chunk's summary as soon as its shard is closed
pub trait ChunkObserver: Send + Sync {
    fn chunk_loaded(&self, summary: &ChunkSummary);
}

impl<F> ChunkObserver for F
where
    F: Fn(&ChunkSummary) + Send + Sync,
{
    fn chunk_loaded(&self, summary: &ChunkSummary) {
        self(summary)
    }
}

impl ChunkObserver for StdoutSink {
    fn chunk_loaded(&self, summary: &ChunkSummary) {
        println!("--- {}", summary);
    }
}

/// Restores every chunk of a source into shards `0..n` under the postings dir
pub struct RestoreOrchestrator {
    config: RestoreConfig,
    sink: Arc<dyn ProgressSink>,
    observer: Arc<dyn ChunkObserver>,
}

impl RestoreOrchestrator {
    /// Create an orchestrator that reports progress and chunk summaries on
    /// stdout
    pub fn new(config: RestoreConfig) -> Self {
        Self {
            config,
            sink: Arc::new(StdoutSink),
            observer: Arc::new(StdoutSink),
        }
    }

    /// Send progress reports somewhere other than stdout
    pub fn with_progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Send chunk summaries somewhere other than stdout
    pub fn with_chunk_observer(mut self, observer: Arc<dyn ChunkObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &RestoreConfig {
        &self.config
    }

    /// Restore from the directory named by the configured location
    pub fn run_location(&self) -> Result<RestoreSummary> {
        self.config.validate()?;
        let source = DirectorySource::new(&self.config.location)?;
        self.run(&source)
    }

    /// Restore every chunk of `source`
    ///
    /// Chunk `i` in enumeration order becomes shard `i`. Each shard is flushed
    /// and closed before the next chunk is opened. The first error ends the
    /// run; shards completed before it stay on disk.
    pub fn run(&self, source: &dyn ChunkSource) -> Result<RestoreSummary> {
        self.config.validate()?;

        tracing::info!(
            "Restoring from {} into {}",
            self.config.location,
            self.config.postings_dir.display()
        );

        let mut summary = RestoreSummary::default();
        for (shard_index, chunk) in source.chunks()?.enumerate() {
            let chunk = chunk?;
            let done = self.restore_chunk(shard_index, chunk)?;
            tracing::info!("{}", done);
            self.observer.chunk_loaded(&done);
            summary.chunks.push(done);
        }

        tracing::info!(
            "Restore complete: {} chunk(s), {} keys",
            summary.chunks.len(),
            summary.total_records()
        );
        Ok(summary)
    }

    /// Load one chunk into a new shard
    fn restore_chunk(&self, shard_index: usize, chunk: Chunk) -> Result<ChunkSummary> {
        let started = Instant::now();
        let name = chunk.name.clone();
        tracing::info!("Loading {} into shard {}", name, shard_index);

        let mut writer =
            ShardWriter::open(&self.config.postings_dir, shard_index, &self.config.engine)?;

        let loaded = self.load_chunk(&mut writer, chunk, started);

        let records = writer.records_sent();
        let batches = writer.batches_sent();
        let shard_dir = writer.dir().to_path_buf();

        // Released on every path, before any error is reported
        let closed = writer.close();
        let flushed_at = loaded?;
        closed?;

        Ok(ChunkSummary {
            name,
            shard_index,
            shard_dir,
            records,
            batches,
            elapsed: flushed_at.saturating_duration_since(started),
            flushed_at,
        })
    }

    /// Decode, batch, send and flush; returns when the flush completed
    fn load_chunk(&self, writer: &mut ShardWriter, chunk: Chunk, started: Instant) -> Result<Instant> {
        let counter = ProgressCounter::new();
        let monitor = if self.config.progress {
            ProgressMonitor::start(
                counter.clone(),
                started,
                self.config.progress_interval,
                Arc::clone(&self.sink),
            )?
        } else {
            ProgressMonitor::disabled()
        };

        let records = StreamDecoder::new(chunk.reader).inspect(|record| {
            if record.is_ok() {
                counter.increment();
            }
        });

        for batch in RecordBatcher::new(records, self.config.batch_capacity) {
            writer.send(batch?)?;
        }

        // No report may follow the flush
        monitor.stop();

        writer.flush()?;
        Ok(Instant::now())
    }
}
