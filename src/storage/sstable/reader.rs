//! SSTable Reader
//!
//! Opens SSTable files and provides O(log n) versioned lookups via an
//! in-memory index.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::error::{LoadError, Result};
use crate::memtable::{MemTableEntry, VersionedKey};

use super::iterator::SSTableIterator;
use super::{
    decode_entry_header, decode_value, read_u32, read_u64, ENTRY_HEADER_SIZE, FOOTER_SIZE,
    HEADER_SIZE, MAGIC, VERSION,
};

/// Index entry: KeyLen (4) + Version (8) + Offset (8)
const INDEX_ENTRY_HEADER: usize = 20;

/// Reader for SSTable files with in-memory index for O(log n) lookups
pub struct SSTableReader {
    path: PathBuf,
    /// File handle for reading entries
    pub(super) file: BufReader<File>,
    /// In-memory index: (key, version) → file offset
    index: BTreeMap<VersionedKey, u64>,
    /// Metadata
    entry_count: u64,
    /// Index block starting offset (for iteration)
    pub(super) index_offset: u64,
}

impl SSTableReader {
    /// Open an SSTable for reading
    ///
    /// Verifies the data checksum and loads the entire index into memory.
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();

        if file_size < HEADER_SIZE + FOOTER_SIZE {
            return Err(LoadError::Storage(format!(
                "SSTable {} too small: {} bytes",
                path.display(),
                file_size
            )));
        }

        // Read and validate header
        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)?;

        if &header[0..4] != MAGIC {
            return Err(LoadError::Storage(format!(
                "Invalid SSTable magic: expected SHLD, got {:?}",
                &header[0..4]
            )));
        }

        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != VERSION {
            return Err(LoadError::Storage(format!(
                "Unsupported SSTable version: {}",
                version
            )));
        }

        let entry_count = read_u64(&header[6..14]);

        // Read footer to get index offset
        file.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))?;
        let mut footer = [0u8; FOOTER_SIZE as usize];
        file.read_exact(&mut footer)?;

        let index_offset = read_u64(&footer[0..8]);
        let data_crc = read_u32(&footer[8..12]);

        if index_offset < HEADER_SIZE || index_offset > file_size - FOOTER_SIZE {
            return Err(LoadError::Storage(format!(
                "SSTable {} has invalid index offset {}",
                path.display(),
                index_offset
            )));
        }

        // Verify the data block against the footer checksum
        file.seek(SeekFrom::Start(HEADER_SIZE))?;
        let mut data = vec![0u8; (index_offset - HEADER_SIZE) as usize];
        file.read_exact(&mut data)?;
        if crc32fast::hash(&data) != data_crc {
            return Err(LoadError::Storage(format!(
                "SSTable {} data checksum mismatch",
                path.display()
            )));
        }
        drop(data);

        // Index block size = file_size - footer_size - index_offset
        let index_block_size = file_size - FOOTER_SIZE - index_offset;
        let mut index_data = vec![0u8; index_block_size as usize];
        file.seek(SeekFrom::Start(index_offset))?;
        file.read_exact(&mut index_data)?;

        // Parse index entries: [key_len(4)][version(8)][offset(8)][key]
        let mut index = BTreeMap::new();
        let mut pos = 0;
        while pos < index_data.len() {
            if pos + INDEX_ENTRY_HEADER > index_data.len() {
                break;
            }
            let key_len = read_u32(&index_data[pos..pos + 4]) as usize;
            let version = read_u64(&index_data[pos + 4..pos + 12]);
            let offset = read_u64(&index_data[pos + 12..pos + 20]);
            pos += INDEX_ENTRY_HEADER;

            if pos + key_len > index_data.len() {
                break;
            }
            let key = index_data[pos..pos + key_len].to_vec();
            pos += key_len;

            index.insert((key, Reverse(version)), offset);
        }

        if index.len() as u64 != entry_count {
            return Err(LoadError::Storage(format!(
                "SSTable {} index holds {} entries, header says {}",
                path.display(),
                index.len(),
                entry_count
            )));
        }

        // Reset file to start for reading
        file.seek(SeekFrom::Start(0))?;

        Ok(Self {
            path: path.to_path_buf(),
            file: BufReader::new(file),
            index,
            entry_count,
            index_offset,
        })
    }

    /// Newest version of a key
    ///
    /// Returns `Err(KeyNotFound)` if the key is not in this SSTable.
    pub fn get_latest(&mut self, key: &[u8]) -> Result<(u64, MemTableEntry)> {
        self.get_at(key, u64::MAX)
    }

    /// Newest version of a key that is `<= read_version`
    ///
    /// Returns `Err(KeyNotFound)` if no such version is in this SSTable.
    pub fn get_at(&mut self, key: &[u8], read_version: u64) -> Result<(u64, MemTableEntry)> {
        let from = (key.to_vec(), Reverse(read_version));
        let to = (key.to_vec(), Reverse(0));
        let offset = match self.index.range(from..=to).next() {
            Some((_, &off)) => off,
            None => return Err(LoadError::KeyNotFound),
        };

        let (_, version, entry) = self.read_entry_at(offset)?;
        Ok((version, entry))
    }

    /// All versions of a key held here, newest first
    pub fn versions(&self, key: &[u8]) -> Vec<u64> {
        let from = (key.to_vec(), Reverse(u64::MAX));
        let to = (key.to_vec(), Reverse(0));
        self.index
            .range(from..=to)
            .map(|((_, Reverse(version)), _)| *version)
            .collect()
    }

    /// Seek to an entry and decode it
    fn read_entry_at(&mut self, offset: u64) -> Result<(Vec<u8>, u64, MemTableEntry)> {
        self.file.seek(SeekFrom::Start(offset))?;

        let mut header = [0u8; ENTRY_HEADER_SIZE];
        self.file.read_exact(&mut header)?;
        let header = decode_entry_header(&header);

        let mut key = vec![0u8; header.key_len];
        self.file.read_exact(&mut key)?;

        let mut value = vec![0u8; header.val_len];
        self.file.read_exact(&mut value)?;

        let version = header.version;
        let entry = decode_value(&header, value)?;
        Ok((key, version, entry))
    }

    /// Get entry count
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Get the minimum key in this SSTable (for range filtering)
    pub fn min_key(&self) -> Option<&[u8]> {
        self.index.keys().next().map(|(k, _)| k.as_slice())
    }

    /// Get the maximum key in this SSTable (for range filtering)
    pub fn max_key(&self) -> Option<&[u8]> {
        self.index.keys().next_back().map(|(k, _)| k.as_slice())
    }

    /// Quick check if a key might be in this SSTable (range check)
    /// Returns false only if the key is definitely outside [min_key, max_key]
    pub fn might_contain(&self, key: &[u8]) -> bool {
        match (self.min_key(), self.max_key()) {
            (Some(min), Some(max)) => key >= min && key <= max,
            _ => false, // Empty SSTable
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create an iterator over all entries in stored order
    pub fn iter(&mut self) -> Result<SSTableIterator<'_>> {
        SSTableIterator::new(&mut self.file, self.index_offset)
    }
}
