//! SSTable Iterator
//!
//! Sequential iteration over all entries in an SSTable.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};

use crate::error::Result;
use crate::memtable::MemTableEntry;

use super::{decode_entry_header, decode_value, ENTRY_HEADER_SIZE, HEADER_SIZE};

/// Iterator over SSTable entries in `(key asc, version desc)` order
pub struct SSTableIterator<'a> {
    file: &'a mut BufReader<File>,
    /// Stop reading when we reach this offset (start of index block)
    end_offset: u64,
    /// Current position in file
    current_offset: u64,
}

impl<'a> SSTableIterator<'a> {
    /// Create a new iterator starting from the data block
    pub(super) fn new(file: &'a mut BufReader<File>, end_offset: u64) -> Result<Self> {
        // Seek to start of data (after header)
        file.seek(SeekFrom::Start(HEADER_SIZE))?;
        Ok(Self {
            file,
            end_offset,
            current_offset: HEADER_SIZE,
        })
    }

    fn read_next(&mut self) -> Result<(Vec<u8>, u64, MemTableEntry)> {
        let mut header = [0u8; ENTRY_HEADER_SIZE];
        self.file.read_exact(&mut header)?;
        let header = decode_entry_header(&header);

        let mut key = vec![0u8; header.key_len];
        self.file.read_exact(&mut key)?;

        let mut value = vec![0u8; header.val_len];
        self.file.read_exact(&mut value)?;

        self.current_offset += (ENTRY_HEADER_SIZE + header.key_len + header.val_len) as u64;

        let version = header.version;
        let entry = decode_value(&header, value)?;
        Ok((key, version, entry))
    }
}

impl<'a> Iterator for SSTableIterator<'a> {
    /// (key, version, entry)
    type Item = Result<(Vec<u8>, u64, MemTableEntry)>;

    fn next(&mut self) -> Option<Self::Item> {
        // Stop at index block
        if self.current_offset >= self.end_offset {
            return None;
        }

        match self.read_next() {
            Ok(item) => Some(Ok(item)),
            Err(e) => {
                // Don't keep reading from an unknown position
                self.current_offset = self.end_offset;
                Some(Err(e))
            }
        }
    }
}
