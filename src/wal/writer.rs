//! WAL Writer
//!
//! Handles appending entries to the WAL file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;

use super::entry::now_millis;
use super::{Mutation, WalEntry};

/// Writes entries to the WAL file
pub struct WalWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    /// LSN handed to the next appended entry
    next_lsn: u64,
    /// fsync after every append
    sync_writes: bool,
}

impl WalWriter {
    /// Open or create a WAL file, positioned at its end
    ///
    /// `next_lsn` continues the sequence of any entries already in the file.
    pub fn open(path: &Path, sync_writes: bool, next_lsn: u64) -> Result<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(path)?;
        file.seek(SeekFrom::End(0))?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            next_lsn: next_lsn.max(1),
            sync_writes,
        })
    }

    /// Append one batch of mutations as a single entry
    ///
    /// Returns the LSN assigned to the entry.
    pub fn append(&mut self, mutations: &[Mutation]) -> Result<u64> {
        let lsn = self.next_lsn;
        let frame = WalEntry::encode(lsn, mutations, now_millis())?;

        self.writer.write_all(&frame)?;
        self.next_lsn += 1;

        if self.sync_writes {
            self.sync()?;
        }

        Ok(lsn)
    }

    /// Push buffered bytes to the OS without forcing them to disk
    pub fn flush_buffer(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        Ok(())
    }

    /// Drop every entry (their contents are durable elsewhere)
    pub fn truncate(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().set_len(0)?;
        self.writer.seek(SeekFrom::Start(0))?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }

    /// LSN of the most recently appended entry (0 if none yet)
    pub fn current_lsn(&self) -> u64 {
        self.next_lsn - 1
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
