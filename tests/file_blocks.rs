//! File-backed block log tests
//!
//! - Appended blocks survive close and reopen
//! - Consolidation results survive reopen
//! - Configuration loaded from disk drives the opened engine

use std::fs::{self, OpenOptions};
use std::io::Write;

use blocklog::blocks::{Block, BlockKind, BlockRegistry, BlockResult, Blocks};
use blocklog::config::{BlocksConfig, CachePolicy};
use blocklog::store::{AppendStore, FileStore};
use tempfile::TempDir;

// =============================================================================
// Test Utilities
// =============================================================================

struct Concat;

impl BlockKind for Concat {
    fn name(&self) -> &str {
        "concat"
    }

    fn merge(&self, older: &Block, newer: &Block, store: &dyn AppendStore) -> BlockResult<Block> {
        let mut body = older.body(store)?;
        body.extend(newer.body(store)?);
        Block::new(older.block_type(), Vec::new(), body)
    }
}

fn create_temp_data_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp dir")
}

fn scan_bodies(engine: &mut Blocks<FileStore>) -> Vec<Vec<u8>> {
    let blocks = engine.blocks().unwrap();
    blocks
        .iter()
        .map(|block| block.body(engine.store()).unwrap())
        .collect()
}

// =============================================================================
// Durability
// =============================================================================

#[test]
fn test_blocks_survive_reopen() {
    let temp_dir = create_temp_data_dir();
    let data_dir = temp_dir.path();

    {
        let mut engine = Blocks::open(data_dir, BlocksConfig::default()).unwrap();
        for body in [&b"first"[..], b"second", b"third"] {
            engine
                .append(&Block::new(100, b"h".to_vec(), body.to_vec()).unwrap())
                .unwrap();
        }
    }

    let mut engine = Blocks::open(data_dir, BlocksConfig::default()).unwrap();
    assert_eq!(
        scan_bodies(&mut engine),
        vec![b"third".to_vec(), b"second".to_vec(), b"first".to_vec()]
    );
    assert!(data_dir.join("blocks/blocks.log").exists());
}

#[test]
fn test_reopen_then_append_continues_history() {
    let temp_dir = create_temp_data_dir();
    let data_dir = temp_dir.path();

    {
        let mut engine = Blocks::open(data_dir, BlocksConfig::default()).unwrap();
        engine
            .append(&Block::new(100, Vec::new(), b"one".to_vec()).unwrap())
            .unwrap();
    }
    {
        let mut engine = Blocks::open(data_dir, BlocksConfig::default()).unwrap();
        engine
            .append(&Block::new(100, Vec::new(), b"two".to_vec()).unwrap())
            .unwrap();
    }

    let mut engine = Blocks::open(data_dir, BlocksConfig::default()).unwrap();
    assert_eq!(scan_bodies(&mut engine), vec![b"two".to_vec(), b"one".to_vec()]);
}

#[test]
fn test_consolidation_survives_reopen() {
    let temp_dir = create_temp_data_dir();
    let data_dir = temp_dir.path();

    {
        let registry = BlockRegistry::new().with_kind(100, Concat).unwrap();
        let mut engine = Blocks::open(data_dir, BlocksConfig::default())
            .unwrap()
            .with_registry(registry);
        for body in [b"a", b"b", b"c"] {
            engine
                .append(&Block::new(100, Vec::new(), body.to_vec()).unwrap())
                .unwrap();
        }
        engine.consolidate(|_| false).unwrap();
    }

    // Markers are understood without the caller's registry
    let mut engine = Blocks::open(data_dir, BlocksConfig::default()).unwrap();
    assert_eq!(scan_bodies(&mut engine), vec![b"abc".to_vec()]);
    assert_eq!(engine.skip_ranges().len(), 1);
}

#[test]
fn test_append_after_torn_write_is_scanned() {
    let temp_dir = create_temp_data_dir();
    let data_dir = temp_dir.path();

    let mut engine = Blocks::open(data_dir, BlocksConfig::default()).unwrap();
    engine
        .append(&Block::new(100, Vec::new(), b"before".to_vec()).unwrap())
        .unwrap();

    // Half of a frame that never finished writing
    let torn = blocklog::blocks::encode(100, b"", b"lost frame").unwrap();
    let mut file = OpenOptions::new()
        .append(true)
        .open(engine.store().path())
        .unwrap();
    file.write_all(&torn[..torn.len() / 2]).unwrap();
    drop(file);

    engine
        .append(&Block::new(100, Vec::new(), b"after".to_vec()).unwrap())
        .unwrap();

    let file_len = fs::metadata(engine.store().path()).unwrap().len();
    assert_eq!(engine.store().len(), file_len);
    assert_eq!(
        scan_bodies(&mut engine),
        vec![b"after".to_vec(), b"before".to_vec()]
    );
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn test_config_file_drives_engine() {
    let temp_dir = create_temp_data_dir();
    let config_path = temp_dir.path().join("blocklog.json");
    fs::write(
        &config_path,
        r#"{"cache_policy": "discard", "read_chunk_size": 5}"#,
    )
    .unwrap();

    let config = BlocksConfig::load(&config_path).unwrap();
    assert_eq!(config.cache_policy, CachePolicy::Discard);

    let mut engine = Blocks::open(temp_dir.path(), config).unwrap();
    assert_eq!(engine.store().chunk_size(), 5);
    for i in 0..20 {
        engine
            .append(&Block::new(100, Vec::new(), format!("entry {}", i).into_bytes()).unwrap())
            .unwrap();
    }

    let bodies = scan_bodies(&mut engine);
    assert_eq!(bodies.len(), 20);
    assert_eq!(bodies[0], b"entry 19".to_vec());
    assert_eq!(bodies[19], b"entry 0".to_vec());
    assert_eq!(engine.cached_blocks(), 0);
}

#[test]
fn test_invalid_config_is_rejected_before_open() {
    let temp_dir = create_temp_data_dir();
    let config = BlocksConfig {
        read_chunk_size: 0,
        ..BlocksConfig::default()
    };

    assert!(Blocks::open(temp_dir.path(), config).is_err());
    assert!(!temp_dir.path().join("blocks").exists());
}
