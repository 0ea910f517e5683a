//! Tests for the Write-Ahead Log
//!
//! These tests verify:
//! - Entry framing and checksum validation
//! - Writer LSN sequencing and truncation
//! - Reader behavior on clean and damaged files
//! - Recovery with partial writes (truncated tail)
//! - Recovery with corrupted entries (CRC mismatch)
//! - Verify mode (stats only, file untouched)

use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;

use shardload::error::LoadError;
use shardload::memtable::MemTableEntry;
use shardload::vlog::{ValuePointer, ValueSlot};
use shardload::wal::{Mutation, WalEntry, WalReader, WalRecovery, WalWriter, HEADER_SIZE};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_wal() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("test.wal");
    (temp_dir, wal_path)
}

fn mutation(key: &str, version: u64, value: &str) -> Mutation {
    Mutation {
        key: key.as_bytes().to_vec(),
        version,
        entry: MemTableEntry {
            user_meta: 0,
            expires_at: 0,
            value: ValueSlot::Inline(value.as_bytes().to_vec()),
        },
    }
}

/// Write `count` single-mutation entries using WalWriter
fn write_entries_via_writer(path: &PathBuf, count: usize) {
    let mut writer = WalWriter::open(path, true, 1).unwrap();
    for i in 0..count {
        writer
            .append(&[mutation(&format!("key{}", i), 1, &format!("value{}", i))])
            .unwrap();
    }
}

/// Write raw serialized entries directly to a file (for crafting corruption)
fn write_raw(path: &PathBuf, chunks: &[Vec<u8>]) {
    let mut file = File::create(path).unwrap();
    for bytes in chunks {
        file.write_all(bytes).unwrap();
    }
    file.sync_all().unwrap();
}

// =============================================================================
// Entry Tests
// =============================================================================

#[test]
fn test_entry_roundtrip_preserves_mutations() {
    let entry = WalEntry::new(
        7,
        vec![
            mutation("a", 1, "x"),
            Mutation {
                key: b"big".to_vec(),
                version: 9,
                entry: MemTableEntry {
                    user_meta: 3,
                    expires_at: 1234,
                    value: ValueSlot::Pointer(ValuePointer { offset: 64, len: 2048 }),
                },
            },
        ],
    );

    let bytes = entry.serialize().unwrap();
    let decoded = WalEntry::deserialize(&bytes).unwrap();

    assert_eq!(decoded, entry);
    assert_eq!(bytes.len() as u64, WalEntry::frame_len((bytes.len() - HEADER_SIZE) as u32));
}

#[test]
fn test_entry_header_layout() {
    let entry = WalEntry::new(42, vec![mutation("k", 1, "v")]);
    let bytes = entry.serialize().unwrap();

    let lsn = u64::from_le_bytes(bytes[0..8].try_into().unwrap());
    let len = u32::from_le_bytes(bytes[12..16].try_into().unwrap());

    assert_eq!(lsn, 42);
    assert_eq!(len as usize, bytes.len() - HEADER_SIZE);
}

#[test]
fn test_entry_crc_mismatch_detected() {
    let entry = WalEntry::new(1, vec![mutation("k", 1, "v")]);
    let mut bytes = entry.serialize().unwrap();
    if let Some(byte) = bytes.last_mut() {
        *byte ^= 0xFF;
    }

    let result = WalEntry::deserialize(&bytes);
    assert!(matches!(result, Err(LoadError::WalCorruption(_))));
}

#[test]
fn test_entry_incomplete_header_detected() {
    let result = WalEntry::deserialize(&[0u8; HEADER_SIZE - 1]);
    assert!(matches!(result, Err(LoadError::WalCorruption(_))));
}

// =============================================================================
// Writer Tests
// =============================================================================

#[test]
fn test_writer_assigns_sequential_lsns() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer = WalWriter::open(&wal_path, false, 1).unwrap();

    assert_eq!(writer.current_lsn(), 0);
    assert_eq!(writer.append(&[mutation("a", 1, "1")]).unwrap(), 1);
    assert_eq!(writer.append(&[mutation("b", 1, "2")]).unwrap(), 2);
    assert_eq!(writer.current_lsn(), 2);
}

#[test]
fn test_writer_continues_from_next_lsn() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer = WalWriter::open(&wal_path, false, 11).unwrap();

    assert_eq!(writer.append(&[mutation("a", 1, "1")]).unwrap(), 11);
}

#[test]
fn test_writer_batch_is_one_entry() {
    let (_temp, wal_path) = setup_temp_wal();
    {
        let mut writer = WalWriter::open(&wal_path, true, 1).unwrap();
        let batch: Vec<Mutation> = (0..100).map(|i| mutation(&format!("k{}", i), 1, "v")).collect();
        writer.append(&batch).unwrap();
    }

    let entries: Vec<WalEntry> = WalReader::open(&wal_path)
        .unwrap()
        .entries()
        .map(|e| e.unwrap())
        .collect();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].mutations.len(), 100);
}

#[test]
fn test_writer_truncate_empties_file() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer = WalWriter::open(&wal_path, true, 1).unwrap();
    writer.append(&[mutation("a", 1, "1")]).unwrap();
    writer.truncate().unwrap();

    assert_eq!(fs::metadata(&wal_path).unwrap().len(), 0);

    // Appends after truncation land at the start of the file
    writer.append(&[mutation("b", 1, "2")]).unwrap();
    writer.sync().unwrap();

    let entries: Vec<WalEntry> = WalReader::open(&wal_path)
        .unwrap()
        .entries()
        .map(|e| e.unwrap())
        .collect();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].lsn, 2);
}

#[test]
fn test_writer_flush_buffer_makes_bytes_visible() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer = WalWriter::open(&wal_path, false, 1).unwrap();
    writer.append(&[mutation("a", 1, "1")]).unwrap();
    writer.flush_buffer().unwrap();

    assert!(fs::metadata(&wal_path).unwrap().len() > HEADER_SIZE as u64);
}

// =============================================================================
// Reader Tests
// =============================================================================

#[test]
fn test_reader_empty_file() {
    let (_temp, wal_path) = setup_temp_wal();
    File::create(&wal_path).unwrap();

    let mut reader = WalReader::open(&wal_path).unwrap();
    assert!(reader.next_entry().unwrap().is_none());
    assert_eq!(reader.position(), 0);
}

#[test]
fn test_reader_tracks_position() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 3);
    let file_len = fs::metadata(&wal_path).unwrap().len();

    let mut reader = WalReader::open(&wal_path).unwrap();
    while reader.next_entry().unwrap().is_some() {}

    assert_eq!(reader.position(), file_len);
}

#[test]
fn test_reader_partial_data_is_corruption() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut bytes = WalEntry::new(1, vec![mutation("k", 1, "v")]).serialize().unwrap();
    bytes.truncate(HEADER_SIZE + 2);
    write_raw(&wal_path, &[bytes]);

    let mut reader = WalReader::open(&wal_path).unwrap();
    assert!(matches!(reader.next_entry(), Err(LoadError::WalCorruption(_))));
}

#[test]
fn test_reader_iterator_stops_after_error() {
    let (_temp, wal_path) = setup_temp_wal();
    let good = WalEntry::new(1, vec![mutation("a", 1, "1")]).serialize().unwrap();
    write_raw(&wal_path, &[good, vec![0u8; 4]]);

    let results: Vec<_> = WalReader::open(&wal_path).unwrap().entries().collect();

    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert!(results[1].is_err());
}

// =============================================================================
// Recover: Clean WAL Tests
// =============================================================================

#[test]
fn test_recover_empty_file() {
    let (_temp, wal_path) = setup_temp_wal();
    File::create(&wal_path).unwrap();

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 0);
    assert_eq!(result.entries_recovered, 0);
    assert_eq!(result.entries_corrupted, 0);
    assert_eq!(result.last_lsn, 0);
    assert!(!result.was_truncated);
}

#[test]
fn test_recover_multiple_entries() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 10);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 10);
    assert_eq!(result.entries_recovered, 10);
    assert_eq!(result.entries_corrupted, 0);
    assert_eq!(result.last_lsn, 10);
    assert!(!result.was_truncated);

    for (i, entry) in entries.iter().enumerate() {
        assert_eq!(entry.lsn, (i + 1) as u64);
        assert_eq!(entry.mutations[0].key, format!("key{}", i).into_bytes());
    }
}

// =============================================================================
// Recover: Partial Write Tests (was_truncated = true)
// =============================================================================

#[test]
fn test_recover_partial_header_at_tail() {
    let (_temp, wal_path) = setup_temp_wal();
    let good = WalEntry::new(1, vec![mutation("k", 1, "v")]).serialize().unwrap();
    let good_len = good.len() as u64;
    write_raw(&wal_path, &[good, vec![0u8; 8]]);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(result.last_lsn, 1);
    assert!(result.was_truncated);
    // Trailing bytes were cut off
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), good_len);
}

#[test]
fn test_recover_partial_data_at_tail() {
    let (_temp, wal_path) = setup_temp_wal();
    let good = WalEntry::new(1, vec![mutation("k", 1, "v")]).serialize().unwrap();
    let mut bad = WalEntry::new(2, vec![mutation("k2", 1, "v2")]).serialize().unwrap();
    bad.truncate(HEADER_SIZE + 4);
    write_raw(&wal_path, &[good, bad]);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(result.entries_recovered, 1);
    assert!(result.was_truncated);
}

// =============================================================================
// Recover: Corruption Tests
// =============================================================================

#[test]
fn test_recover_corrupted_entry() {
    let (_temp, wal_path) = setup_temp_wal();
    let good = WalEntry::new(1, vec![mutation("k1", 1, "v1")]).serialize().unwrap();
    let mut bad = WalEntry::new(2, vec![mutation("k2", 1, "v2")]).serialize().unwrap();
    if let Some(byte) = bad.last_mut() {
        *byte ^= 0xFF;
    }
    write_raw(&wal_path, &[good, bad]);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(result.entries_recovered, 1);
    assert_eq!(result.entries_corrupted, 1);
    assert_eq!(result.last_lsn, 1);
    assert!(result.was_truncated);
}

#[test]
fn test_recover_lsn_regression_drops_tail() {
    let (_temp, wal_path) = setup_temp_wal();
    let first = WalEntry::new(5, vec![mutation("a", 1, "1")]).serialize().unwrap();
    let first_len = first.len() as u64;
    let stale = WalEntry::new(3, vec![mutation("b", 1, "2")]).serialize().unwrap();
    write_raw(&wal_path, &[first, stale]);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(result.last_lsn, 5);
    assert_eq!(result.entries_corrupted, 1);
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), first_len);
}

// =============================================================================
// Verify Tests
// =============================================================================

#[test]
fn test_verify_does_not_modify_file() {
    let (_temp, wal_path) = setup_temp_wal();
    let good = WalEntry::new(1, vec![mutation("k", 1, "v")]).serialize().unwrap();
    write_raw(&wal_path, &[good, vec![0u8; 5]]);
    let before = fs::metadata(&wal_path).unwrap().len();

    let result = WalRecovery::verify(&wal_path).unwrap();

    assert_eq!(result.entries_recovered, 1);
    assert!(!result.was_truncated);
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), before);
}

#[test]
fn test_recover_and_verify_agree() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 20);

    let verify_result = WalRecovery::verify(&wal_path).unwrap();
    let (entries, recover_result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), recover_result.entries_recovered as usize);
    assert_eq!(recover_result.entries_recovered, verify_result.entries_recovered);
    assert_eq!(recover_result.entries_corrupted, verify_result.entries_corrupted);
    assert_eq!(recover_result.last_lsn, verify_result.last_lsn);
}
