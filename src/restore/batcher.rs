//! Record batcher
//!
//! Groups a record stream into fixed-capacity batches.

use std::iter::Peekable;

use crate::error::Result;
use crate::record::Record;

/// An ordered group of records submitted to a shard in one write
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    records: Vec<Record>,
    /// Set only on the batch carrying the chunk's last records
    is_final: bool,
}

impl Batch {
    pub fn new(records: Vec<Record>, is_final: bool) -> Self {
        Self { records, is_final }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// True if no batch follows this one for the current chunk
    pub fn is_final(&self) -> bool {
        self.is_final
    }
}

/// Turns a fallible record stream into batches of at most `capacity` records
///
/// Exactly one batch per chunk is marked final:
/// - a full batch is final when the stream has nothing after it
/// - otherwise the trailing partial batch is final
/// - an empty stream yields a single empty final batch
///
/// A stream error is passed through at once; records buffered for the
/// unfinished batch are dropped. Nothing is yielded after the final batch or
/// an error.
pub struct RecordBatcher<I: Iterator<Item = Result<Record>>> {
    records: Peekable<I>,
    capacity: usize,
    done: bool,
}

impl<I: Iterator<Item = Result<Record>>> RecordBatcher<I> {
    pub fn new(records: I, capacity: usize) -> Self {
        Self {
            records: records.peekable(),
            capacity: capacity.max(1),
            done: false,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<I: Iterator<Item = Result<Record>>> Iterator for RecordBatcher<I> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut records = Vec::with_capacity(self.capacity);
        while records.len() < self.capacity {
            match self.records.next() {
                Some(Ok(record)) => records.push(record),
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                None => {
                    self.done = true;
                    return Some(Ok(Batch::new(records, true)));
                }
            }
        }

        // Full batch: look one record ahead to know whether it is the last
        let is_final = self.records.peek().is_none();
        if is_final {
            self.done = true;
        }
        Some(Ok(Batch::new(records, is_final)))
    }
}
