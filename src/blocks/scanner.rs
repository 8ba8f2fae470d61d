//! Backward scanner
//!
//! Walks a store from its tail toward the scan floor and reconstructs blocks
//! without any index:
//!
//! 1. Pull a chunk ending at the cursor and prepend it to the first
//!    `SENTINEL.len()` bytes of the previous buffer, so a sentinel split
//!    across two chunks is still found
//! 2. Search the buffer from its end for the sentinel
//! 3. Read and verify the 18-byte preamble ending at the match; a failed
//!    verification is a coincidental sentinel, keep searching earlier
//! 4. Build the record through the registry and move the cursor to the
//!    start of its frame, then past any known skip range
//! 5. Bookkeeping records feed the skip tracker; user records are yielded
//!
//! A scan never fails loudly. A torn tail, a preamble that cannot be read or
//! a store error ends the sequence; the reason is kept in the scan state.

use std::collections::HashMap;

use super::errors::{BlockError, BlockResult};
use super::frame::{Preamble, PREAMBLE_LEN, SENTINEL};
use super::record::{Block, Record};
use super::registry::BlockRegistry;
use super::skip::SkipRanges;
use crate::config::CachePolicy;
use crate::observability::{log_event_with_fields, Event, MetricsRegistry};
use crate::store::AppendStore;

/// Decoded records keyed by frame end (the offset just past the sentinel).
#[derive(Debug, Clone, Default)]
pub struct DecodeCache {
    records: HashMap<u64, Record>,
}

impl DecodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, frame_end: u64) -> Option<&Record> {
        self.records.get(&frame_end)
    }

    pub fn insert(&mut self, frame_end: u64, record: Record) {
        self.records.insert(frame_end, record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

/// Engine state a scan step needs, borrowed for the duration of one step.
pub(crate) struct ScanContext<'a> {
    pub store: &'a dyn AppendStore,
    pub registry: &'a BlockRegistry,
    pub cache: &'a mut DecodeCache,
    pub skips: &'a mut SkipRanges,
    pub metrics: &'a MetricsRegistry,
    pub cache_policy: CachePolicy,
    pub floor: u64,
}

impl ScanContext<'_> {
    fn apply_skips(&self, cursor: u64) -> u64 {
        let adjusted = self.skips.apply(cursor);
        if adjusted != cursor {
            self.metrics.increment_skip_jumps();
        }
        adjusted
    }
}

/// Resumable position of one backward scan.
///
/// Holds no borrow of the engine, so the engine can append between steps.
#[derive(Debug)]
pub struct ScanState {
    /// Everything at or above this offset has been read into `buffer` or
    /// attributed to a frame
    cursor: u64,
    /// Lowest offset the scan may read
    floor: u64,
    /// Current chunk followed by the carried bytes of the previous chunk
    buffer: Vec<u8>,
    /// Store offset of `buffer[0]`
    buffer_start: u64,
    /// Length of the chunk part of `buffer`
    chunk_len: usize,
    /// Sentinel search continues in `buffer[..search_end]`
    search_end: usize,
    finished: bool,
    error: Option<BlockError>,
}

impl ScanState {
    /// Starts a scan at the tail of the store.
    pub(crate) fn start(ctx: &ScanContext<'_>) -> Self {
        let len = ctx.store.len();
        let cursor = if len > ctx.floor { ctx.apply_skips(len) } else { len };
        Self {
            cursor,
            floor: ctx.floor,
            buffer: Vec::new(),
            buffer_start: cursor,
            chunk_len: 0,
            search_end: 0,
            finished: false,
            error: None,
        }
    }

    /// Offset the scan resumes reading below.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Why the scan ended early, if it did.
    pub fn error(&self) -> Option<&BlockError> {
        self.error.as_ref()
    }

    pub fn take_error(&mut self) -> Option<BlockError> {
        self.error.take()
    }

    /// Advances to the next user block.
    ///
    /// Returns the block and the cursor after it, or `None` once the scan has
    /// ended.
    pub(crate) fn next(&mut self, ctx: &mut ScanContext<'_>) -> Option<(Block, u64)> {
        while !self.finished {
            match self.pull(ctx) {
                Ok(Some(Record::Skip(marker))) => {
                    ctx.metrics.increment_system_blocks();
                    if ctx.skips.record(marker.range()) {
                        log_event_with_fields(
                            Event::SkipRangeDiscovered,
                            &[
                                ("from_position", &marker.from_position().to_string()),
                                ("to_position", &marker.to_position().to_string()),
                            ],
                        );
                    }
                    // The marker's own range may cover the cursor already
                    self.cursor = ctx.apply_skips(self.cursor);
                }
                Ok(Some(Record::Data(block))) if block.is_system() => {
                    ctx.metrics.increment_system_blocks();
                }
                Ok(Some(Record::Data(block))) => {
                    ctx.metrics.increment_blocks_yielded();
                    return Some((block, self.cursor));
                }
                Ok(None) => self.finish(ctx, None),
                Err(e) => self.finish(ctx, Some(e)),
            }
        }
        None
    }

    fn finish(&mut self, ctx: &ScanContext<'_>, error: Option<BlockError>) {
        self.finished = true;
        self.buffer = Vec::new();
        let cursor = self.cursor.to_string();
        match &error {
            None => log_event_with_fields(Event::ScanComplete, &[("cursor", &cursor)]),
            Some(e) if e.is_fatal() => {
                log_event_with_fields(Event::StoreFailure, &[("cursor", &cursor), ("reason", &e.to_string())])
            }
            Some(e) => {
                ctx.metrics.increment_truncated_scans();
                log_event_with_fields(Event::ScanTruncated, &[("cursor", &cursor), ("reason", &e.to_string())]);
            }
        }
        self.error = error;
    }

    /// Finds the next frame of any type, or `None` at the end of history.
    fn pull(&mut self, ctx: &mut ScanContext<'_>) -> BlockResult<Option<Record>> {
        loop {
            if let Some(record) = self.search(ctx)? {
                return Ok(Some(record));
            }

            let adjusted = ctx.apply_skips(self.cursor);
            if adjusted != self.cursor {
                // Carried bytes are no longer adjacent to the next chunk
                self.buffer.clear();
                self.cursor = adjusted;
            }
            if self.cursor <= self.floor {
                return Ok(None);
            }

            let chunk = ctx
                .store
                .reverse_read(self.cursor)
                .map_err(|e| BlockError::store_failed(format!("Backward read from {} failed", self.cursor), e))?;
            let mut chunk = match chunk {
                Some(chunk) if !chunk.is_empty() => chunk,
                _ => return Ok(None),
            };

            // Never look below the floor
            let available = (self.cursor - self.floor) as usize;
            if chunk.len() > available {
                chunk.drain(..chunk.len() - available);
            }

            let chunk_start = self.cursor - chunk.len() as u64;
            let carry = self.buffer.len().min(SENTINEL.len());
            self.chunk_len = chunk.len();
            chunk.extend_from_slice(&self.buffer[..carry]);
            self.buffer = chunk;
            self.buffer_start = chunk_start;
            self.search_end = self.buffer.len();
            self.cursor = chunk_start;
        }
    }

    /// Searches the unsearched part of the buffer for a valid frame.
    fn search(&mut self, ctx: &mut ScanContext<'_>) -> BlockResult<Option<Record>> {
        while let Some(at) = rfind_sentinel(&self.buffer[..self.search_end]) {
            self.search_end = at;
            if at >= self.chunk_len {
                // Entirely inside the carried bytes: already examined
                continue;
            }

            let frame_end = self.buffer_start + (at + SENTINEL.len()) as u64;
            if let Some(record) = self.decode_at(frame_end, ctx)? {
                let frame_start = frame_end - record.block().frame_len();
                self.buffer.clear();
                self.chunk_len = 0;
                self.search_end = 0;
                self.cursor = ctx.apply_skips(frame_start);
                self.buffer_start = self.cursor;
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    /// Decodes the frame ending at `frame_end`.
    ///
    /// `Ok(None)` means the sentinel was coincidental.
    fn decode_at(&self, frame_end: u64, ctx: &mut ScanContext<'_>) -> BlockResult<Option<Record>> {
        if let Some(record) = ctx.cache.get(frame_end) {
            ctx.metrics.increment_cache_hits();
            return Ok(Some(record.clone()));
        }

        let preamble_start = frame_end
            .checked_sub(PREAMBLE_LEN as u64)
            .filter(|start| *start >= self.floor)
            .ok_or_else(|| BlockError::truncated_at(frame_end, "Preamble extends below the scan floor"))?;
        let bytes = ctx
            .store
            .measured_reverse_read(frame_end, preamble_start)
            .map_err(|e| BlockError::store_failed(format!("Preamble read at {} failed", frame_end), e))?;
        let mut raw = [0u8; PREAMBLE_LEN];
        match bytes {
            Some(bytes) if bytes.len() == PREAMBLE_LEN => raw.copy_from_slice(&bytes),
            _ => return Err(BlockError::truncated_at(frame_end, "Preamble is not fully readable")),
        }

        let preamble = Preamble::decode(&raw);
        if !preamble.verify() {
            ctx.metrics.increment_false_sentinels();
            let mismatch = BlockError::checksum_mismatch_at(frame_end, "Preamble failed verification");
            log_event_with_fields(Event::FalseSentinel, &[("reason", &mismatch.to_string())]);
            return Ok(None);
        }

        let fits = frame_end
            .checked_sub(preamble.frame_len())
            .map_or(false, |start| start >= self.floor);
        if !fits {
            return Err(BlockError::truncated_at(
                frame_end,
                format!(
                    "Frame of {} bytes extends below the scan floor {}",
                    preamble.frame_len(),
                    self.floor
                ),
            ));
        }

        let block = Block::stored(
            preamble.block_type,
            preamble_start,
            preamble.header_len,
            preamble.body_len,
        );
        let record = ctx.registry.construct(block, ctx.store)?;
        if ctx.cache_policy == CachePolicy::Retain {
            ctx.cache.insert(frame_end, record.clone());
        }
        Ok(Some(record))
    }
}

/// Start index of the last complete sentinel in `buf`.
fn rfind_sentinel(buf: &[u8]) -> Option<usize> {
    buf.windows(SENTINEL.len()).rposition(|w| w == SENTINEL)
}
