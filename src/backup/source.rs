//! Chunk sources
//!
//! Enumerates the backup chunks found at a location, in a stable order.

use std::fs::{self, File};
use std::io::{BufReader, Cursor, Read};
use std::path::{Path, PathBuf};

use crate::error::{LoadError, Result};

/// File extension of backup chunks in a directory source
pub const BACKUP_EXTENSION: &str = "backup";

/// One backup chunk: a name and its framed byte stream
pub struct Chunk {
    /// Chunk name (file name for directory sources)
    pub name: String,

    /// Framed record stream
    pub reader: Box<dyn Read + Send>,
}

impl Chunk {
    pub fn new(name: impl Into<String>, reader: impl Read + Send + 'static) -> Self {
        Self {
            name: name.into(),
            reader: Box::new(reader),
        }
    }
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk").field("name", &self.name).finish()
    }
}

/// Lazy, fallible sequence of chunks in enumeration order
pub type ChunkIter<'a> = Box<dyn Iterator<Item = Result<Chunk>> + 'a>;

/// Something that can enumerate backup chunks
///
/// Chunks are opened lazily: a consumer that stops early never opens the
/// remaining chunks.
pub trait ChunkSource {
    /// Enumerate the chunks of this source
    fn chunks(&self) -> Result<ChunkIter<'_>>;
}

// =============================================================================
// Directory Source
// =============================================================================

/// Chunks stored as `*.backup` files in a local directory
///
/// The location may be a plain path or a `file://` URI. Files are visited in
/// lexicographic file-name order.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    /// Create a source from a location string
    pub fn new(location: &str) -> Result<Self> {
        let path = match location.split_once("://") {
            Some(("file", rest)) => rest,
            Some((scheme, _)) => {
                return Err(LoadError::Enumeration(format!(
                    "unsupported location scheme: {}",
                    scheme
                )))
            }
            None => location,
        };

        if path.is_empty() {
            return Err(LoadError::Enumeration("empty source location".to_string()));
        }

        Ok(Self {
            root: PathBuf::from(path),
        })
    }

    /// Directory being scanned
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Paths of all chunk files, sorted by file name
    pub fn chunk_paths(&self) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.root).map_err(|e| {
            LoadError::Enumeration(format!("cannot list {}: {}", self.root.display(), e))
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| LoadError::Enumeration(e.to_string()))?
                .path();
            let is_backup = path.extension().map_or(false, |ext| ext == BACKUP_EXTENSION);
            if path.is_file() && is_backup {
                paths.push(path);
            }
        }

        paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(paths)
    }
}

impl ChunkSource for DirectorySource {
    fn chunks(&self) -> Result<ChunkIter<'_>> {
        let paths = self.chunk_paths()?;
        tracing::debug!("Found {} chunk(s) in {}", paths.len(), self.root.display());

        Ok(Box::new(paths.into_iter().map(|path| {
            let file = File::open(&path).map_err(|e| {
                LoadError::Enumeration(format!("cannot open {}: {}", path.display(), e))
            })?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            Ok(Chunk::new(name, BufReader::new(file)))
        })))
    }
}

// =============================================================================
// Memory Source
// =============================================================================

/// Chunks held in memory, enumerated in insertion order
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    chunks: Vec<(String, Vec<u8>)>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk
    pub fn push(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.chunks.push((name.into(), bytes));
    }

    /// Builder-style append
    pub fn with_chunk(mut self, name: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.push(name, bytes);
        self
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

impl ChunkSource for MemorySource {
    fn chunks(&self) -> Result<ChunkIter<'_>> {
        Ok(Box::new(self.chunks.iter().map(|(name, bytes)| {
            Ok(Chunk::new(name.clone(), Cursor::new(bytes.clone())))
        })))
    }
}
