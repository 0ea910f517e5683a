//! Progress reporting
//!
//! A background thread that periodically reports how many records a chunk
//! has loaded so far.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, Sender, TryRecvError};

use crate::error::Result;

/// Shared count of records processed for the current chunk
#[derive(Debug, Clone, Default)]
pub struct ProgressCounter(Arc<AtomicU64>);

impl ProgressCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// One progress sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressReport {
    /// Wall-clock time since the chunk started
    pub elapsed: Duration,

    /// Records processed so far
    pub records: u64,

    /// Records per second over `elapsed`
    pub records_per_sec: u64,

    /// When the sample was taken
    pub at: Instant,
}

impl ProgressReport {
    fn sample(counter: &ProgressCounter, started: Instant) -> Self {
        let at = Instant::now();
        let elapsed = at.saturating_duration_since(started);
        let records = counter.get();
        let secs = elapsed.as_secs_f64();
        let records_per_sec = if secs > 0.0 {
            (records as f64 / secs) as u64
        } else {
            0
        };

        Self {
            elapsed,
            records,
            records_per_sec,
            at,
        }
    }
}

impl fmt::Display for ProgressReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "... Time elapsed: {}s, keys loaded: {}, speed: {} keys/s",
            self.elapsed.as_secs_f64().round() as u64,
            self.records,
            self.records_per_sec
        )
    }
}

/// Receives progress reports from the monitor thread
pub trait ProgressSink: Send + Sync {
    fn report(&self, report: &ProgressReport);
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressReport) + Send + Sync,
{
    fn report(&self, report: &ProgressReport) {
        self(report)
    }
}

/// Prints each report as a line on stdout
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

impl ProgressSink for StdoutSink {
    fn report(&self, report: &ProgressReport) {
        println!("{}", report);
    }
}

/// Handle to the optional reporting thread of one chunk
///
/// `stop` (or dropping the handle) signals the thread and waits for it to
/// exit, so no report can be emitted once it returns.
pub struct ProgressMonitor {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ProgressMonitor {
    /// Start reporting every `interval`, measuring elapsed time from `started`
    pub fn start(
        counter: ProgressCounter,
        started: Instant,
        interval: Duration,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<Self> {
        let (stop_tx, stop_rx) = channel::bounded::<()>(1);

        let handle = thread::Builder::new()
            .name("progress".to_string())
            .spawn(move || run_monitor(counter, started, interval, sink, stop_rx))?;

        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// A monitor that never reports and owns no thread
    pub fn disabled() -> Self {
        Self {
            stop_tx: None,
            handle: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Stop the thread and wait for it to exit
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Disconnecting the channel is the stop signal
        self.stop_tx.take();

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("Progress monitor thread panicked");
            }
        }
    }
}

impl Drop for ProgressMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_monitor(
    counter: ProgressCounter,
    started: Instant,
    interval: Duration,
    sink: Arc<dyn ProgressSink>,
    stop_rx: Receiver<()>,
) {
    let ticker = channel::tick(interval);

    loop {
        channel::select! {
            recv(stop_rx) -> _ => break,
            recv(ticker) -> _ => {
                // A pending stop wins over a tick that raced with it
                if !matches!(stop_rx.try_recv(), Err(TryRecvError::Empty)) {
                    break;
                }
                let report = ProgressReport::sample(&counter, started);
                tracing::debug!(
                    records = report.records,
                    records_per_sec = report.records_per_sec,
                    "progress"
                );
                sink.report(&report);
            }
        }
    }
}
