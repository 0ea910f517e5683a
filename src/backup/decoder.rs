//! Stream decoder
//!
//! Lazily turns a chunk's byte stream into records.

use std::io::{ErrorKind, Read};

use crate::error::{FramePart, LoadError, Result};
use crate::record::{BincodeCodec, Record, RecordCodec};

use super::LENGTH_PREFIX_SIZE;

/// Upper bound on the buffer reserved ahead of a body read
const MAX_BODY_PREALLOC: u64 = 64 * 1024;

/// Decodes framed records from a byte stream
///
/// The sequence is finite and cannot be restarted: it ends at a clean EOF on
/// a frame boundary, or after the first error.
pub struct StreamDecoder<R, C = BincodeCodec> {
    reader: R,
    codec: C,
    /// Records successfully decoded so far (also the ordinal of the next one)
    records_read: u64,
    /// Bytes consumed from the stream
    bytes_read: u64,
    finished: bool,
}

impl<R: Read> StreamDecoder<R, BincodeCodec> {
    /// Create a decoder using the default bincode codec
    pub fn new(reader: R) -> Self {
        Self::with_codec(reader, BincodeCodec)
    }
}

impl<R: Read, C: RecordCodec> StreamDecoder<R, C> {
    /// Create a decoder with a custom record codec
    pub fn with_codec(reader: R, codec: C) -> Self {
        Self {
            reader,
            codec,
            records_read: 0,
            bytes_read: 0,
            finished: false,
        }
    }

    /// Read the next record
    ///
    /// Returns:
    /// - `Ok(Some(record))`: a full frame was decoded
    /// - `Ok(None)`: the stream ended on a frame boundary
    /// - `Err(StreamCorruption)`: short prefix or short body
    /// - `Err(Deserialization)`: the body is not a valid record
    pub fn next_record(&mut self) -> Result<Option<Record>> {
        let record = self.records_read;

        let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
        let filled = self.read_prefix(&mut prefix)?;
        if filled == 0 {
            return Ok(None);
        }
        if filled < LENGTH_PREFIX_SIZE {
            return Err(LoadError::StreamCorruption {
                record,
                part: FramePart::LengthPrefix,
                expected: LENGTH_PREFIX_SIZE as u64,
                actual: filled as u64,
            });
        }

        let declared = u64::from_le_bytes(prefix);

        // Grow with the data instead of trusting the prefix for the allocation
        let mut body = Vec::with_capacity(declared.min(MAX_BODY_PREALLOC) as usize);
        let read = self.reader.by_ref().take(declared).read_to_end(&mut body)? as u64;
        self.bytes_read += read;
        if read != declared {
            return Err(LoadError::StreamCorruption {
                record,
                part: FramePart::Body,
                expected: declared,
                actual: read,
            });
        }

        let decoded = self
            .codec
            .decode(&body)
            .map_err(|e| LoadError::Deserialization {
                record,
                reason: e.to_string(),
            })?;

        self.records_read += 1;
        Ok(Some(decoded))
    }

    /// Number of records decoded so far
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// Number of bytes consumed from the stream so far
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Fill as much of the prefix as the stream provides, stopping at EOF
    fn read_prefix(&mut self, prefix: &mut [u8; LENGTH_PREFIX_SIZE]) -> Result<usize> {
        let mut filled = 0;
        while filled < prefix.len() {
            match self.reader.read(&mut prefix[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        self.bytes_read += filled as u64;
        Ok(filled)
    }
}

impl<R: Read, C: RecordCodec> Iterator for StreamDecoder<R, C> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
