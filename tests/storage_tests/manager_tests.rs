//! Tests for StorageManager
//!
//! These tests verify:
//! - Opening/creating storage directories
//! - Flushing MemTable to SSTable, with version retention
//! - Versioned queries across multiple SSTables
//! - Persistence (restart and rediscover SSTables)

use std::path::PathBuf;

use shardload::config::VersionRetention;
use shardload::error::LoadError;
use shardload::memtable::{MemTable, MemTableEntry};
use shardload::storage::StorageManager;
use shardload::vlog::ValueSlot;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_storage() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("sstables");
    (temp_dir, path)
}

fn inline(value: &[u8]) -> MemTableEntry {
    MemTableEntry {
        user_meta: 0,
        expires_at: 0,
        value: ValueSlot::Inline(value.to_vec()),
    }
}

fn create_memtable_with_entries(entries: &[(&[u8], u64, &[u8])]) -> MemTable {
    let memtable = MemTable::new();
    for (key, version, value) in entries {
        memtable.put(key.to_vec(), *version, inline(value));
    }
    memtable
}

// =============================================================================
// Open/Create Tests
// =============================================================================

#[test]
fn test_open_creates_directory() {
    let (_temp, path) = setup_temp_storage();

    let storage = StorageManager::open(&path).unwrap();

    assert!(path.exists());
    assert_eq!(storage.sstable_count(), 0);
    assert_eq!(storage.next_sstable_id(), 1);
    assert_eq!(storage.data_dir(), path.as_path());
}

// =============================================================================
// Flush Tests
// =============================================================================

#[test]
fn test_flush_single_memtable() {
    let (_temp, path) = setup_temp_storage();
    let storage = StorageManager::open(&path).unwrap();
    let memtable = create_memtable_with_entries(&[(b"a", 1, b"1"), (b"b", 1, b"2")]);

    let sstable = storage.flush(&memtable, VersionRetention::Unbounded).unwrap();

    assert_eq!(sstable.entry_count, 2);
    assert_eq!(storage.sstable_count(), 1);
    assert!(path.join("sstable_000001.sst").exists());
}

#[test]
fn test_flush_empty_memtable_fails() {
    let (_temp, path) = setup_temp_storage();
    let storage = StorageManager::open(&path).unwrap();

    let result = storage.flush(&MemTable::new(), VersionRetention::Unbounded);
    assert!(matches!(result, Err(LoadError::Storage(_))));
}

#[test]
fn test_flush_unbounded_keeps_every_version() {
    let (_temp, path) = setup_temp_storage();
    let storage = StorageManager::open(&path).unwrap();
    let memtable =
        create_memtable_with_entries(&[(b"k", 1, b"v1"), (b"k", 2, b"v2"), (b"k", 3, b"v3")]);

    storage.flush(&memtable, VersionRetention::Unbounded).unwrap();

    assert_eq!(storage.versions(b"k"), vec![3, 2, 1]);
}

#[test]
fn test_flush_latest_retention_drops_old_versions() {
    let (_temp, path) = setup_temp_storage();
    let storage = StorageManager::open(&path).unwrap();
    let memtable = create_memtable_with_entries(&[
        (b"k", 1, b"v1"),
        (b"k", 2, b"v2"),
        (b"k", 3, b"v3"),
        (b"other", 7, b"o7"),
    ]);

    let sstable = storage.flush(&memtable, VersionRetention::Latest(2)).unwrap();

    assert_eq!(sstable.entry_count, 3);
    assert_eq!(storage.versions(b"k"), vec![3, 2]);
    assert_eq!(storage.versions(b"other"), vec![7]);
}

// =============================================================================
// Get Tests
// =============================================================================

#[test]
fn test_get_not_found() {
    let (_temp, path) = setup_temp_storage();
    let storage = StorageManager::open(&path).unwrap();
    storage
        .flush(&create_memtable_with_entries(&[(b"a", 1, b"1")]), VersionRetention::Unbounded)
        .unwrap();

    assert_eq!(storage.get_latest(b"zzz").unwrap(), None);
}

#[test]
fn test_get_highest_version_across_sstables() {
    let (_temp, path) = setup_temp_storage();
    let storage = StorageManager::open(&path).unwrap();

    // The newer table holds the older version
    storage
        .flush(&create_memtable_with_entries(&[(b"k", 9, b"nine")]), VersionRetention::Unbounded)
        .unwrap();
    storage
        .flush(&create_memtable_with_entries(&[(b"k", 4, b"four")]), VersionRetention::Unbounded)
        .unwrap();

    assert_eq!(storage.get_latest(b"k").unwrap(), Some((9, inline(b"nine"))));
    assert_eq!(storage.get_at(b"k", 8).unwrap(), Some((4, inline(b"four"))));
    assert_eq!(storage.versions(b"k"), vec![9, 4]);
}

#[test]
fn test_newer_table_wins_same_version() {
    let (_temp, path) = setup_temp_storage();
    let storage = StorageManager::open(&path).unwrap();

    storage
        .flush(&create_memtable_with_entries(&[(b"k", 5, b"first")]), VersionRetention::Unbounded)
        .unwrap();
    storage
        .flush(&create_memtable_with_entries(&[(b"k", 5, b"second")]), VersionRetention::Unbounded)
        .unwrap();

    assert_eq!(storage.get_latest(b"k").unwrap(), Some((5, inline(b"second"))));

    let entries = storage.entries().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries.values().next(), Some(&inline(b"second")));
}

// =============================================================================
// Persistence Tests
// =============================================================================

#[test]
fn test_persistence_across_restart() {
    let (_temp, path) = setup_temp_storage();

    {
        let storage = StorageManager::open(&path).unwrap();
        storage
            .flush(
                &create_memtable_with_entries(&[(b"a", 1, b"1"), (b"b", 2, b"2")]),
                VersionRetention::Unbounded,
            )
            .unwrap();
        storage
            .flush(&create_memtable_with_entries(&[(b"a", 3, b"3")]), VersionRetention::Unbounded)
            .unwrap();
    }

    let storage = StorageManager::open(&path).unwrap();

    assert_eq!(storage.sstable_count(), 2);
    assert_eq!(storage.next_sstable_id(), 3);
    assert_eq!(storage.get_latest(b"a").unwrap(), Some((3, inline(b"3"))));
    assert_eq!(storage.get_latest(b"b").unwrap(), Some((2, inline(b"2"))));
    assert_eq!(storage.entries().unwrap().len(), 3);
}

#[test]
fn test_ignores_non_sstable_files() {
    let (_temp, path) = setup_temp_storage();
    std::fs::create_dir_all(&path).unwrap();
    std::fs::write(path.join("notes.txt"), b"hello").unwrap();
    std::fs::write(path.join("sstable_abc.sst"), b"junk").unwrap();

    let storage = StorageManager::open(&path).unwrap();

    assert_eq!(storage.sstable_count(), 0);
}
