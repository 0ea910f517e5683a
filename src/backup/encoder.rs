//! Chunk encoder
//!
//! Writes records in the chunk framing.

use std::io::Write;

use crate::error::Result;
use crate::record::{BincodeCodec, Record, RecordCodec};

/// Writes length-prefixed records to a byte sink
pub struct ChunkEncoder<W: Write, C = BincodeCodec> {
    writer: W,
    codec: C,
    records_written: u64,
    bytes_written: u64,
}

impl<W: Write> ChunkEncoder<W, BincodeCodec> {
    /// Create an encoder using the default bincode codec
    pub fn new(writer: W) -> Self {
        Self::with_codec(writer, BincodeCodec)
    }
}

impl<W: Write, C: RecordCodec> ChunkEncoder<W, C> {
    /// Create an encoder with a custom record codec
    pub fn with_codec(writer: W, codec: C) -> Self {
        Self {
            writer,
            codec,
            records_written: 0,
            bytes_written: 0,
        }
    }

    /// Serialize and frame one record
    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        let body = self.codec.encode(record)?;
        self.write_frame(&body)
    }

    /// Frame an already-serialized body
    pub fn write_frame(&mut self, body: &[u8]) -> Result<()> {
        self.writer.write_all(&(body.len() as u64).to_le_bytes())?;
        self.writer.write_all(body)?;
        self.records_written += 1;
        self.bytes_written += 8 + body.len() as u64;
        Ok(())
    }

    /// Number of frames written
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Number of bytes written, prefixes included
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Flush and hand back the underlying writer
    pub fn finish(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}
