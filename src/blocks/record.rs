//! Block record model
//!
//! A block is written once and never mutated. Blocks decoded from a store
//! keep only their anchor and lengths; header and body are re-read from the
//! store on demand. Blocks built in memory carry their bytes inline until
//! they are appended.
//!
//! Record shapes are closed: [`Record::Data`] for user blocks and
//! [`Record::Skip`] for the consolidation marker. Caller-defined behavior
//! (merging) is attached through a [`BlockKind`] from the registry.

use std::fmt;
use std::sync::Arc;

use super::errors::{BlockError, BlockResult};
use super::frame::{self, Preamble};
use super::registry::BlockKind;
use super::skip::SkipRange;
use crate::store::AppendStore;

/// Block types below this value are reserved for bookkeeping blocks.
pub const SYSTEM_TYPE_THRESHOLD: u32 = 100;

/// Reserved type of the skip marker.
pub const SKIP_BLOCK_TYPE: u32 = 10;

/// Size of the skip marker header: two u64 positions.
pub const SKIP_HEADER_LEN: usize = 16;

/// Where a block's header and body bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Built in memory, not yet appended
    Inline { header: Vec<u8>, body: Vec<u8> },
    /// Decoded from a store; `anchor` is the offset where the header ends
    Stored { anchor: u64 },
}

/// A single framed unit of data.
#[derive(Clone)]
pub struct Block {
    block_type: u32,
    header_len: u32,
    body_len: u32,
    payload: Payload,
    kind: Option<Arc<dyn BlockKind>>,
}

impl Block {
    /// Builds an in-memory block.
    ///
    /// # Errors
    ///
    /// `BLOCK_INVALID_ARGUMENT` if the header or body exceeds `u32::MAX` bytes.
    pub fn new(block_type: u32, header: Vec<u8>, body: Vec<u8>) -> BlockResult<Self> {
        let preamble = Preamble::new(block_type, header.len() as u64, body.len() as u64)?;
        Ok(Self {
            block_type,
            header_len: preamble.header_len,
            body_len: preamble.body_len,
            payload: Payload::Inline { header, body },
            kind: None,
        })
    }

    /// Describes a block already present in a store.
    pub fn stored(block_type: u32, anchor: u64, header_len: u32, body_len: u32) -> Self {
        Self {
            block_type,
            header_len,
            body_len,
            payload: Payload::Stored { anchor },
            kind: None,
        }
    }

    /// Attaches the kind that supplies this block's merge behavior.
    pub fn with_kind(mut self, kind: Arc<dyn BlockKind>) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn block_type(&self) -> u32 {
        self.block_type
    }

    pub fn header_len(&self) -> u32 {
        self.header_len
    }

    pub fn body_len(&self) -> u32 {
        self.body_len
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn kind(&self) -> Option<&Arc<dyn BlockKind>> {
        self.kind.as_ref()
    }

    /// Store offset between header and preamble, for stored blocks.
    pub fn anchor(&self) -> Option<u64> {
        match self.payload {
            Payload::Stored { anchor } => Some(anchor),
            Payload::Inline { .. } => None,
        }
    }

    /// Returns whether the type is in the reserved bookkeeping range.
    pub fn is_system(&self) -> bool {
        self.block_type < SYSTEM_TYPE_THRESHOLD
    }

    /// Size of the encoded frame.
    pub fn frame_len(&self) -> u64 {
        frame::PREAMBLE_LEN as u64 + self.header_len as u64 + self.body_len as u64
    }

    /// Offset of the first body byte, for stored blocks.
    ///
    /// `None` for inline blocks, or when the lengths reach before offset 0.
    pub fn frame_start(&self) -> Option<u64> {
        self.anchor()?
            .checked_sub(self.header_len as u64)?
            .checked_sub(self.body_len as u64)
    }

    /// Reads the header bytes.
    pub fn header(&self, store: &dyn AppendStore) -> BlockResult<Vec<u8>> {
        match &self.payload {
            Payload::Inline { header, .. } => Ok(header.clone()),
            Payload::Stored { anchor } => {
                read_exact(store, *anchor, self.header_len, "header")
            }
        }
    }

    /// Reads the body bytes.
    pub fn body(&self, store: &dyn AppendStore) -> BlockResult<Vec<u8>> {
        match &self.payload {
            Payload::Inline { body, .. } => Ok(body.clone()),
            Payload::Stored { anchor } => {
                let body_end = anchor.checked_sub(self.header_len as u64).ok_or_else(|| {
                    BlockError::truncated_at(*anchor, "Block header extends before start of store")
                })?;
                read_exact(store, body_end, self.body_len, "body")
            }
        }
    }

    /// Encodes this block as a frame ready to append.
    pub fn encode(&self, store: &dyn AppendStore) -> BlockResult<Vec<u8>> {
        let header = self.header(store)?;
        let body = self.body(store)?;
        frame::encode(self.block_type, &header, &body)
    }

    /// Combines this (older) block with a newer one.
    ///
    /// # Errors
    ///
    /// `BLOCK_NOT_MERGEABLE` unless this block's kind supplies a merge.
    pub fn merge(&self, newer: &Block, store: &dyn AppendStore) -> BlockResult<Block> {
        match &self.kind {
            Some(kind) => kind.merge(self, newer, store),
            None => Err(BlockError::not_mergeable(format!(
                "Block({}) has no merge capability; cannot merge with Block({})",
                self.block_type, newer.block_type
            ))),
        }
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("block_type", &self.block_type)
            .field("header_len", &self.header_len)
            .field("body_len", &self.body_len)
            .field("payload", &self.payload)
            .field("kind", &self.kind.as_ref().map(|k| k.name().to_string()))
            .finish()
    }
}

fn read_exact(store: &dyn AppendStore, end: u64, len: u32, what: &str) -> BlockResult<Vec<u8>> {
    let start = end.checked_sub(len as u64).ok_or_else(|| {
        BlockError::truncated_at(end, format!("Block {} extends before start of store", what))
    })?;
    let bytes = store
        .measured_reverse_read(end, start)
        .map_err(|e| BlockError::store_failed(format!("Failed to read block {}", what), e))?;
    match bytes {
        Some(bytes) if bytes.len() == len as usize => Ok(bytes),
        _ => Err(BlockError::truncated_at(
            end,
            format!("Block {} of {} bytes is not readable", what, len),
        )),
    }
}

/// Bookkeeping block recording a consolidated range.
///
/// Header: `[from_position u64 BE][to_position u64 BE]`, no body.
#[derive(Debug, Clone)]
pub struct SkipMarker {
    block: Block,
    range: SkipRange,
}

impl SkipMarker {
    /// Builds a marker in memory. Its positions are readable immediately.
    pub fn new(from_position: u64, to_position: u64) -> Self {
        let mut header = Vec::with_capacity(SKIP_HEADER_LEN);
        header.extend_from_slice(&from_position.to_be_bytes());
        header.extend_from_slice(&to_position.to_be_bytes());
        Self {
            block: Block {
                block_type: SKIP_BLOCK_TYPE,
                header_len: SKIP_HEADER_LEN as u32,
                body_len: 0,
                payload: Payload::Inline { header, body: Vec::new() },
                kind: None,
            },
            range: SkipRange::new(from_position, to_position),
        }
    }

    /// Decodes a marker from a block read out of a store.
    pub fn from_block(block: Block, store: &dyn AppendStore) -> BlockResult<Self> {
        if block.header_len as usize != SKIP_HEADER_LEN {
            return Err(BlockError::invalid_argument(format!(
                "Skip block header must be {} bytes, got {}",
                SKIP_HEADER_LEN, block.header_len
            )));
        }
        let header = block.header(store)?;
        let mut from = [0u8; 8];
        let mut to = [0u8; 8];
        from.copy_from_slice(&header[0..8]);
        to.copy_from_slice(&header[8..16]);
        Ok(Self {
            block,
            range: SkipRange::new(u64::from_be_bytes(from), u64::from_be_bytes(to)),
        })
    }

    /// Upper boundary of the consolidated range.
    pub fn from_position(&self) -> u64 {
        self.range.from_position
    }

    /// Lower boundary of the consolidated range.
    pub fn to_position(&self) -> u64 {
        self.range.to_position
    }

    pub fn range(&self) -> SkipRange {
        self.range
    }

    pub fn block(&self) -> &Block {
        &self.block
    }

    /// Bookkeeping blocks are never combined with user data.
    pub fn merge(&self, other: &Block) -> BlockResult<Block> {
        Err(BlockError::not_mergeable(format!(
            "System Block({}) {:?} cannot be merged with Block({})",
            self.block.block_type, self.range, other.block_type
        )))
    }
}

/// A decoded record: one of the closed set of shapes.
#[derive(Debug, Clone)]
pub enum Record {
    /// User block (generic or caller kind), or an unknown reserved type
    Data(Block),
    /// Consolidation marker
    Skip(SkipMarker),
}

impl Record {
    pub fn block(&self) -> &Block {
        match self {
            Record::Data(block) => block,
            Record::Skip(marker) => marker.block(),
        }
    }

    pub fn block_type(&self) -> u32 {
        self.block().block_type()
    }

    pub fn is_system(&self) -> bool {
        self.block().is_system()
    }

    /// Merges this (older) record with a newer block.
    pub fn merge(&self, newer: &Block, store: &dyn AppendStore) -> BlockResult<Block> {
        match self {
            Record::Data(block) => block.merge(newer, store),
            Record::Skip(marker) => marker.merge(newer),
        }
    }
}
