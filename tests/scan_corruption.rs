//! Scan corruption tests
//!
//! Damaged bytes never produce a wrong block:
//! - A frame whose preamble fails verification is skipped
//! - A torn tail is ignored; older blocks are still found
//! - A frame cut off at the start of the store ends the scan with a
//!   truncation reason instead of an item
//! - Stray sentinel bytes are counted and passed over

use blocklog::blocks::{encode, Block, BlockErrorCode, Blocks, PREAMBLE_LEN};
use blocklog::store::{AppendStore, MemoryStore};

// =============================================================================
// Test Utilities
// =============================================================================

/// Frames for single-byte bodies, concatenated in order.
fn frames(bodies: &[&[u8]]) -> Vec<u8> {
    bodies
        .iter()
        .flat_map(|body| encode(100, b"", body).unwrap())
        .collect()
}

fn scan_bodies(engine: &mut Blocks<MemoryStore>) -> Vec<Vec<u8>> {
    let blocks = engine.blocks().unwrap();
    blocks
        .iter()
        .map(|block| block.body(engine.store()).unwrap())
        .collect()
}

// =============================================================================
// Preamble verification
// =============================================================================

#[test]
fn test_corrupted_checksum_skips_that_frame() {
    let mut bytes = frames(&[b"A", b"B", b"C"]);
    let frame_len = PREAMBLE_LEN + 1;
    // First checksum byte of B's preamble
    bytes[2 * frame_len - PREAMBLE_LEN + 12] ^= 0xFF;

    let mut engine = Blocks::new(MemoryStore::from_bytes(bytes));
    assert_eq!(scan_bodies(&mut engine), vec![b"C".to_vec(), b"A".to_vec()]);
    assert!(engine.metrics().snapshot().false_sentinels >= 1);
}

#[test]
fn test_corrupted_length_field_is_rejected() {
    let mut bytes = frames(&[b"A", b"B"]);
    let frame_len = PREAMBLE_LEN + 1;
    // Body length of B claims 2 bytes
    bytes[2 * frame_len - PREAMBLE_LEN + 7] = 2;

    let mut engine = Blocks::new(MemoryStore::from_bytes(bytes));
    assert_eq!(scan_bodies(&mut engine), vec![b"A".to_vec()]);
}

#[test]
fn test_destroyed_sentinel_hides_only_that_frame() {
    let mut bytes = frames(&[b"A", b"B", b"C"]);
    let last = bytes.len() - 1;
    bytes[last] = 0x00;

    let mut engine = Blocks::new(MemoryStore::from_bytes(bytes));
    assert_eq!(scan_bodies(&mut engine), vec![b"B".to_vec(), b"A".to_vec()]);
}

// =============================================================================
// Torn frames
// =============================================================================

#[test]
fn test_torn_tail_is_ignored() {
    let mut bytes = frames(&[b"A", b"B"]);
    let partial = encode(100, b"", b"C").unwrap();
    bytes.extend_from_slice(&partial[..10]);

    let mut engine = Blocks::new(MemoryStore::from_bytes(bytes));
    let mut scan = engine.iterate();
    let count = scan.by_ref().count();
    assert_eq!(count, 2);
    assert!(scan.error().is_none());
}

#[test]
fn test_torn_head_ends_scan_as_truncated() {
    let head = encode(100, b"", b"lost").unwrap();
    let mut bytes = head[head.len() - 10..].to_vec();
    bytes.extend(frames(&[b"A"]));

    let mut engine = Blocks::new(MemoryStore::from_bytes(bytes));
    let mut scan = engine.iterate();
    let yielded: Vec<u32> = scan.by_ref().map(|(block, _)| block.block_type()).collect();
    assert_eq!(yielded, vec![100]);

    let err = scan.into_error().expect("scan should record why it stopped");
    assert_eq!(err.code(), BlockErrorCode::BlockTruncated);
    assert!(!err.is_fatal());
    assert_eq!(engine.metrics().snapshot().truncated_scans, 1);
}

#[test]
fn test_torn_head_still_reports_ok_through_blocks() {
    let head = encode(100, b"", b"lost").unwrap();
    let mut bytes = head[head.len() - 10..].to_vec();
    bytes.extend(frames(&[b"A", b"B"]));

    let mut engine = Blocks::new(MemoryStore::from_bytes(bytes));
    assert_eq!(scan_bodies(&mut engine), vec![b"B".to_vec(), b"A".to_vec()]);
}

// =============================================================================
// Stray sentinels
// =============================================================================

#[test]
fn test_stray_sentinel_in_tail_garbage() {
    let mut bytes = frames(&[b"A", b"B", b"C"]);
    bytes.extend_from_slice(b"zz#!zz");

    let mut engine = Blocks::new(MemoryStore::from_bytes(bytes));
    assert_eq!(
        scan_bodies(&mut engine),
        vec![b"C".to_vec(), b"B".to_vec(), b"A".to_vec()]
    );
    assert_eq!(engine.metrics().snapshot().false_sentinels, 1);
}

#[test]
fn test_appending_after_garbage_keeps_history() {
    let mut bytes = frames(&[b"A"]);
    bytes.extend_from_slice(b"garbage");
    let mut engine = Blocks::new(MemoryStore::from_bytes(bytes));

    engine
        .append(&Block::new(100, Vec::new(), b"B".to_vec()).unwrap())
        .unwrap();
    assert_eq!(scan_bodies(&mut engine), vec![b"B".to_vec(), b"A".to_vec()]);
    assert_eq!(engine.store().len(), 19 + 7 + 19);
}
