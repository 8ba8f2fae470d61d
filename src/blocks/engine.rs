//! Block engine
//!
//! Owns one store together with everything derived from it: the decode
//! cache, the skip ranges learned while scanning, the kind registry and the
//! metrics. Single writer, single reader.

use std::path::Path;

use super::errors::{BlockError, BlockResult};
use super::record::Block;
use super::registry::BlockRegistry;
use super::scanner::{DecodeCache, ScanContext, ScanState};
use super::skip::SkipRanges;
use crate::config::{BlocksConfig, CachePolicy};
use crate::observability::{log_event_with_fields, Event, MetricsRegistry};
use crate::store::{AppendStore, FileStore};

/// Append, scan and consolidate blocks over an [`AppendStore`].
#[derive(Debug)]
pub struct Blocks<S: AppendStore> {
    store: S,
    config: BlocksConfig,
    registry: BlockRegistry,
    cache: DecodeCache,
    skips: SkipRanges,
    metrics: MetricsRegistry,
}

impl Blocks<FileStore> {
    /// Opens (or creates) the block log under `data_dir`.
    pub fn open(data_dir: &Path, config: BlocksConfig) -> BlockResult<Self> {
        config.validate()?;
        let store = FileStore::open_from_data_dir(data_dir)
            .and_then(|store| store.with_chunk_size(config.read_chunk_size))
            .map_err(|e| {
                BlockError::store_failed(format!("Failed to open block log in {}", data_dir.display()), e)
            })?;
        Self::with_config(store, config)
    }
}

impl<S: AppendStore> Blocks<S> {
    /// Creates an engine with the default configuration.
    pub fn new(store: S) -> Self {
        Self {
            store,
            config: BlocksConfig::default(),
            registry: BlockRegistry::new(),
            cache: DecodeCache::new(),
            skips: SkipRanges::new(),
            metrics: MetricsRegistry::new(),
        }
    }

    /// Creates an engine with a validated configuration.
    ///
    /// `read_chunk_size` is not applied here; `store` keeps the chunk size
    /// it was built with.
    pub fn with_config(store: S, config: BlocksConfig) -> BlockResult<Self> {
        config.validate()?;
        let mut engine = Self::new(store);
        engine.config = config;
        Ok(engine)
    }

    /// Replaces the kind registry.
    pub fn with_registry(mut self, registry: BlockRegistry) -> Self {
        self.registry = registry;
        self.cache.clear();
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn config(&self) -> &BlocksConfig {
        &self.config
    }

    pub fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    /// Mutable registry access. Clears the decode cache, since cached
    /// records were built by the previous kinds.
    pub fn registry_mut(&mut self) -> &mut BlockRegistry {
        self.cache.clear();
        &mut self.registry
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    /// Skip ranges discovered so far.
    pub fn skip_ranges(&self) -> &SkipRanges {
        &self.skips
    }

    /// Number of decoded records held in the cache.
    pub fn cached_blocks(&self) -> usize {
        self.cache.len()
    }

    /// Drops every cached record.
    pub fn invalidate_cache(&mut self) {
        if !self.cache.is_empty() {
            log_event_with_fields(Event::CacheInvalidated, &[("entries", &self.cache.len().to_string())]);
        }
        self.cache.clear();
    }

    /// Appends a user block and returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// - `BLOCK_INVALID_ARGUMENT` for types below 100
    /// - `BLOCK_STORE_FAILED` if the store rejects the append
    pub fn append(&mut self, block: &Block) -> BlockResult<u64> {
        if block.is_system() {
            return Err(BlockError::invalid_argument(format!(
                "Block type {} is reserved for bookkeeping records",
                block.block_type()
            )));
        }
        self.append_frame(block)
    }

    /// Encodes and appends any block, bookkeeping types included.
    pub(crate) fn append_frame(&mut self, block: &Block) -> BlockResult<u64> {
        let frame = block.encode(&self.store)?;
        let position = self.store.len();
        if let Err(e) = self.store.append(&frame) {
            let error = BlockError::store_failed(
                format!("Append of Block({}) to store {} failed", block.block_type(), self.store.id()),
                e,
            );
            log_event_with_fields(Event::StoreFailure, &[("reason", &error.to_string())]);
            return Err(error);
        }

        let bytes = frame.len() as u64;
        self.metrics.record_append(bytes);
        log_event_with_fields(
            Event::BlockAppend,
            &[
                ("block_type", &block.block_type().to_string()),
                ("position", &position.to_string()),
                ("bytes", &bytes.to_string()),
            ],
        );
        Ok(bytes)
    }

    /// Scans the store newest-first.
    ///
    /// Each item is a user block and the offset the scan resumes below.
    pub fn iterate(&mut self) -> Scan<'_, S> {
        let state = ScanState::start(&self.scan_context());
        Scan { engine: self, state }
    }

    /// Collects the user blocks of one full scan.
    pub fn blocks(&mut self) -> BlockResult<Vec<Block>> {
        let mut scan = self.iterate();
        let blocks: Vec<Block> = scan.by_ref().map(|(block, _)| block).collect();
        match scan.into_error() {
            Some(e) if e.is_fatal() => Err(e),
            _ => Ok(blocks),
        }
    }

    pub(crate) fn scan_context(&mut self) -> ScanContext<'_> {
        ScanContext {
            store: &self.store,
            registry: &self.registry,
            cache: &mut self.cache,
            skips: &mut self.skips,
            metrics: &self.metrics,
            cache_policy: self.config.cache_policy,
            floor: self.config.scan_floor,
        }
    }

    /// Applies the cache policy at the end of an operation.
    pub(crate) fn settle_cache(&mut self) {
        if self.config.cache_policy == CachePolicy::Discard {
            self.cache.clear();
        }
    }
}

/// One backward scan over a [`Blocks`] engine.
pub struct Scan<'a, S: AppendStore> {
    engine: &'a mut Blocks<S>,
    state: ScanState,
}

impl<S: AppendStore> Scan<'_, S> {
    /// Offset the scan resumes reading below.
    pub fn cursor(&self) -> u64 {
        self.state.cursor()
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_finished()
    }

    /// Why the scan ended early, if it did.
    pub fn error(&self) -> Option<&BlockError> {
        self.state.error()
    }

    pub fn into_error(mut self) -> Option<BlockError> {
        self.state.take_error()
    }
}

impl<S: AppendStore> Iterator for Scan<'_, S> {
    type Item = (Block, u64);

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.state.next(&mut self.engine.scan_context());
        if item.is_none() {
            self.engine.settle_cache();
        }
        item
    }
}
