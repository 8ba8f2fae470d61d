//! Block type registry
//!
//! Maps a decoded block type to the [`BlockKind`] that constructs its record
//! shape. Lookup order:
//!
//! 1. caller-registered kinds (user types only)
//! 2. built-in bookkeeping kinds
//! 3. generic fallback: a plain [`Record::Data`] block with no merge

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::errors::{BlockError, BlockResult};
use super::record::{Block, Record, SkipMarker, SKIP_BLOCK_TYPE, SYSTEM_TYPE_THRESHOLD};
use crate::store::AppendStore;

/// Behavior attached to a block type.
pub trait BlockKind: Send + Sync {
    /// Name used in logs and debug output.
    fn name(&self) -> &str;

    /// Builds the record shape for a decoded block.
    fn construct(&self, block: Block, _store: &dyn AppendStore) -> BlockResult<Record> {
        Ok(Record::Data(block))
    }

    /// Combines an older block with a newer one into a single block.
    fn merge(&self, older: &Block, newer: &Block, _store: &dyn AppendStore) -> BlockResult<Block> {
        Err(BlockError::not_mergeable(format!(
            "Kind '{}' does not merge Block({}) with Block({})",
            self.name(),
            older.block_type(),
            newer.block_type()
        )))
    }
}

/// Built-in kind for the consolidation marker.
struct SkipKind;

impl BlockKind for SkipKind {
    fn name(&self) -> &str {
        "skip"
    }

    fn construct(&self, block: Block, store: &dyn AppendStore) -> BlockResult<Record> {
        SkipMarker::from_block(block, store).map(Record::Skip)
    }
}

static SKIP_KIND: SkipKind = SkipKind;

fn builtin(block_type: u32) -> Option<&'static dyn BlockKind> {
    match block_type {
        SKIP_BLOCK_TYPE => Some(&SKIP_KIND),
        _ => None,
    }
}

/// Caller-extensible map from block type to kind.
#[derive(Clone, Default)]
pub struct BlockRegistry {
    kinds: HashMap<u32, Arc<dyn BlockKind>>,
}

impl BlockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a kind for a user block type.
    ///
    /// # Errors
    ///
    /// `BLOCK_INVALID_ARGUMENT` for reserved types (below 100).
    pub fn register(&mut self, block_type: u32, kind: impl BlockKind + 'static) -> BlockResult<()> {
        if block_type < SYSTEM_TYPE_THRESHOLD {
            return Err(BlockError::invalid_argument(format!(
                "Block type {} is reserved; user kinds must use {} to {}",
                block_type,
                SYSTEM_TYPE_THRESHOLD,
                u32::MAX
            )));
        }
        self.kinds.insert(block_type, Arc::new(kind));
        Ok(())
    }

    /// Builder form of [`BlockRegistry::register`].
    pub fn with_kind(mut self, block_type: u32, kind: impl BlockKind + 'static) -> BlockResult<Self> {
        self.register(block_type, kind)?;
        Ok(self)
    }

    /// Returns the caller kind registered for a type.
    pub fn get(&self, block_type: u32) -> Option<&Arc<dyn BlockKind>> {
        self.kinds.get(&block_type)
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Builds the record for a block decoded from `store`.
    pub fn construct(&self, block: Block, store: &dyn AppendStore) -> BlockResult<Record> {
        let block_type = block.block_type();
        if let Some(kind) = self.kinds.get(&block_type) {
            return kind.construct(block.with_kind(Arc::clone(kind)), store);
        }
        if let Some(kind) = builtin(block_type) {
            return kind.construct(block, store);
        }
        Ok(Record::Data(block))
    }
}

impl fmt::Debug for BlockRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.kinds.iter().map(|(t, k)| (*t, k.name().to_string())).collect();
        types.sort();
        f.debug_struct("BlockRegistry").field("kinds", &types).finish()
    }
}
