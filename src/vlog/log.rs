//! Value log file

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{LoadError, Result};

use super::{ValuePointer, VALUE_HEADER_SIZE};

/// Appends large values and reads them back by pointer
pub struct ValueLog {
    path: PathBuf,
    /// Buffered append handle
    writer: BufWriter<File>,
    /// Separate handle for positioned reads
    reader: File,
    /// Offset where the next value is appended
    end_offset: u64,
    sync_writes: bool,
    /// Appended bytes may still sit in the write buffer
    dirty: bool,
}

impl ValueLog {
    /// Open or create a value log, appending after any existing values
    pub fn open(path: &Path, sync_writes: bool) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let end_offset = file.metadata()?.len();
        let reader = File::open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            reader,
            end_offset,
            sync_writes,
            dirty: false,
        })
    }

    /// Append a value and return its pointer
    pub fn append(&mut self, value: &[u8]) -> Result<ValuePointer> {
        let len = u32::try_from(value.len()).map_err(|_| {
            LoadError::Storage(format!("Value of {} bytes exceeds value log limit", value.len()))
        })?;

        let pointer = ValuePointer {
            offset: self.end_offset,
            len,
        };

        let crc = crc32fast::hash(value);
        self.writer.write_all(&len.to_le_bytes())?;
        self.writer.write_all(&crc.to_le_bytes())?;
        self.writer.write_all(value)?;

        self.end_offset += VALUE_HEADER_SIZE + value.len() as u64;
        self.dirty = true;

        if self.sync_writes {
            self.sync()?;
        }

        Ok(pointer)
    }

    /// Read a value back, verifying its checksum
    pub fn read(&mut self, pointer: ValuePointer) -> Result<Vec<u8>> {
        if self.dirty {
            self.writer.flush()?;
            self.dirty = false;
        }

        if pointer.offset + VALUE_HEADER_SIZE + pointer.len as u64 > self.end_offset {
            return Err(LoadError::Storage(format!(
                "Value pointer {:?} beyond end of value log ({} bytes)",
                pointer, self.end_offset
            )));
        }

        self.reader.seek(SeekFrom::Start(pointer.offset))?;

        let mut header = [0u8; VALUE_HEADER_SIZE as usize];
        self.reader.read_exact(&mut header)?;
        let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

        if len != pointer.len {
            return Err(LoadError::Storage(format!(
                "Value log length mismatch at offset {}: pointer says {}, log says {}",
                pointer.offset, pointer.len, len
            )));
        }

        let mut value = vec![0u8; len as usize];
        self.reader.read_exact(&mut value)?;

        if crc32fast::hash(&value) != crc {
            return Err(LoadError::Storage(format!(
                "Value log checksum mismatch at offset {}",
                pointer.offset
            )));
        }

        Ok(value)
    }

    /// Push buffered bytes to the OS without forcing them to disk
    pub fn flush_buffer(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.dirty = false;
        Ok(())
    }

    /// Force all appended values to stable storage
    pub fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        self.dirty = false;
        Ok(())
    }

    /// Total size of the log in bytes
    pub fn size(&self) -> u64 {
        self.end_offset
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
