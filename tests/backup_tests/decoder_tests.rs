//! Tests for chunk framing
//!
//! These tests verify:
//! - Decode/encode round-trip of the byte stream
//! - Clean end of stream at a frame boundary
//! - Short length prefix and short body detection
//! - Undecodable bodies
//! - Stream position bookkeeping

use std::io::Cursor;

use shardload::backup::{ChunkEncoder, StreamDecoder, LENGTH_PREFIX_SIZE};
use shardload::error::{FramePart, LoadError};
use shardload::record::{BincodeCodec, Record, RecordCodec};

// =============================================================================
// Helper Functions
// =============================================================================

fn sample_records(count: u64) -> Vec<Record> {
    (0..count)
        .map(|i| {
            Record::new(format!("key{:05}", i), format!("value-{}", i), i + 1)
                .with_user_meta((i % 3) as u8)
                .with_expires_at(if i % 2 == 0 { 0 } else { 1_700_000_000 + i })
        })
        .collect()
}

/// Encode records, returning the bytes and the end offset of every frame
fn encode(records: &[Record]) -> (Vec<u8>, Vec<usize>) {
    let mut encoder = ChunkEncoder::new(Vec::new());
    let mut boundaries = Vec::new();
    for record in records {
        encoder.write_record(record).unwrap();
        boundaries.push(encoder.bytes_written() as usize);
    }
    (encoder.finish().unwrap(), boundaries)
}

fn decode_all(bytes: &[u8]) -> Result<Vec<Record>, LoadError> {
    StreamDecoder::new(Cursor::new(bytes.to_vec())).collect()
}

// =============================================================================
// Round-trip Tests
// =============================================================================

#[test]
fn test_decode_then_reencode_reproduces_stream() {
    let (bytes, _) = encode(&sample_records(50));

    let decoded = decode_all(&bytes).unwrap();
    let (reencoded, _) = encode(&decoded);

    assert_eq!(decoded, sample_records(50));
    assert_eq!(reencoded, bytes);
}

#[test]
fn test_frame_layout() {
    let record = Record::new("k", "v", 1);
    let body = BincodeCodec.encode(&record).unwrap();
    let (bytes, _) = encode(&[record]);

    assert_eq!(bytes.len(), LENGTH_PREFIX_SIZE + body.len());
    assert_eq!(&bytes[..LENGTH_PREFIX_SIZE], &(body.len() as u64).to_le_bytes());
    assert_eq!(&bytes[LENGTH_PREFIX_SIZE..], body.as_slice());
}

#[test]
fn test_empty_stream_yields_nothing() {
    assert_eq!(decode_all(&[]).unwrap(), Vec::<Record>::new());
}

#[test]
fn test_counters_track_progress() {
    let (bytes, _) = encode(&sample_records(7));
    let mut decoder = StreamDecoder::new(Cursor::new(bytes.clone()));

    while decoder.next_record().unwrap().is_some() {}

    assert_eq!(decoder.records_read(), 7);
    assert_eq!(decoder.bytes_read(), bytes.len() as u64);
}

// =============================================================================
// Truncation Tests
// =============================================================================

#[test]
fn test_truncation_at_frame_boundary_is_clean() {
    let records = sample_records(10);
    let (bytes, boundaries) = encode(&records);

    // Cut right after the fourth frame
    let decoded = decode_all(&bytes[..boundaries[3]]).unwrap();

    assert_eq!(decoded, records[..4].to_vec());
}

#[test]
fn test_short_body_is_corruption() {
    let records = sample_records(5);
    let (bytes, boundaries) = encode(&records);
    let last_start = boundaries[3];
    let declared = (boundaries[4] - last_start - LENGTH_PREFIX_SIZE) as u64;

    let mut decoder = StreamDecoder::new(Cursor::new(bytes[..bytes.len() - 3].to_vec()));
    let mut good = Vec::new();
    let err = loop {
        match decoder.next() {
            Some(Ok(record)) => good.push(record),
            Some(Err(e)) => break e,
            None => panic!("stream ended without an error"),
        }
    };

    assert_eq!(good, records[..4].to_vec());
    match err {
        LoadError::StreamCorruption {
            record,
            part,
            expected,
            actual,
        } => {
            assert_eq!(record, 4);
            assert_eq!(part, FramePart::Body);
            assert_eq!(expected, declared);
            assert_eq!(actual, declared - 3);
        }
        other => panic!("expected StreamCorruption, got {:?}", other),
    }
    assert!(decoder.next().is_none());
}

#[test]
fn test_short_prefix_after_records_is_corruption() {
    let (mut bytes, _) = encode(&sample_records(2));
    bytes.extend_from_slice(&[9, 0, 0, 0, 0]);

    let err = decode_all(&bytes).unwrap_err();

    assert!(matches!(
        err,
        LoadError::StreamCorruption {
            record: 2,
            part: FramePart::LengthPrefix,
            expected: 8,
            actual: 5,
        }
    ));
}

#[test]
fn test_huge_declared_length_reports_actual_bytes() {
    let mut bytes = u64::MAX.to_le_bytes().to_vec();
    bytes.extend_from_slice(&[1, 2, 3]);

    let err = decode_all(&bytes).unwrap_err();

    assert!(matches!(
        err,
        LoadError::StreamCorruption {
            part: FramePart::Body,
            expected: u64::MAX,
            actual: 3,
            ..
        }
    ));
}

// =============================================================================
// Deserialization Tests
// =============================================================================

#[test]
fn test_garbage_body_is_deserialization_error() {
    let (good, _) = encode(&sample_records(1));
    let mut encoder = ChunkEncoder::new(good);
    encoder.write_frame(&[0xff; 4]).unwrap();
    let bytes = encoder.finish().unwrap();

    let err = decode_all(&bytes).unwrap_err();

    assert!(matches!(err, LoadError::Deserialization { record: 1, .. }));
}

#[test]
fn test_trailing_bytes_in_body_are_deserialization_error() {
    let mut body = BincodeCodec.encode(&Record::new("k", "v", 1)).unwrap();
    body.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
    let mut encoder = ChunkEncoder::new(Vec::new());
    encoder.write_frame(&body).unwrap();
    let bytes = encoder.finish().unwrap();

    let err = decode_all(&bytes).unwrap_err();

    assert!(matches!(err, LoadError::Deserialization { record: 0, .. }));
}

#[test]
fn test_empty_body_is_deserialization_error() {
    let mut encoder = ChunkEncoder::new(Vec::new());
    encoder.write_frame(&[]).unwrap();
    let bytes = encoder.finish().unwrap();

    let err = decode_all(&bytes).unwrap_err();

    assert!(matches!(err, LoadError::Deserialization { record: 0, .. }));
}
