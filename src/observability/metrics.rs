//! Metrics registry for a block engine
//!
//! - Counters only
//! - Monotonic increase
//! - One registry per engine instance

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operational counters for one engine.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Blocks appended (user and bookkeeping)
    blocks_appended: AtomicU64,
    /// Frame bytes appended
    bytes_appended: AtomicU64,
    /// User blocks yielded by scans
    blocks_yielded: AtomicU64,
    /// Bookkeeping blocks consumed by scans
    system_blocks_seen: AtomicU64,
    /// Frames served from the decode cache
    cache_hits: AtomicU64,
    /// Sentinel matches rejected by preamble verification
    false_sentinels: AtomicU64,
    /// Scans ended early on a torn or unreadable frame
    truncated_scans: AtomicU64,
    /// Cursor jumps over consolidated ranges
    skip_jumps: AtomicU64,
    /// Consolidation passes completed
    consolidations: AtomicU64,
    /// Merged blocks flushed by consolidation
    consolidation_flushes: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one appended frame of `bytes` bytes
    pub fn record_append(&self, bytes: u64) {
        self.blocks_appended.fetch_add(1, Ordering::Relaxed);
        self.bytes_appended.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn increment_blocks_yielded(&self) {
        self.blocks_yielded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_system_blocks(&self) {
        self.system_blocks_seen.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_cache_hits(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_false_sentinels(&self) {
        self.false_sentinels.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_truncated_scans(&self) {
        self.truncated_scans.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_skip_jumps(&self) {
        self.skip_jumps.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_consolidations(&self) {
        self.consolidations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_consolidation_flushes(&self) {
        self.consolidation_flushes.fetch_add(1, Ordering::Relaxed);
    }

    /// Get all metrics as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            blocks_appended: self.blocks_appended.load(Ordering::Relaxed),
            bytes_appended: self.bytes_appended.load(Ordering::Relaxed),
            blocks_yielded: self.blocks_yielded.load(Ordering::Relaxed),
            system_blocks_seen: self.system_blocks_seen.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            false_sentinels: self.false_sentinels.load(Ordering::Relaxed),
            truncated_scans: self.truncated_scans.load(Ordering::Relaxed),
            skip_jumps: self.skip_jumps.load(Ordering::Relaxed),
            consolidations: self.consolidations.load(Ordering::Relaxed),
            consolidation_flushes: self.consolidation_flushes.load(Ordering::Relaxed),
        }
    }

    /// Export all metrics as a JSON object
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub blocks_appended: u64,
    pub bytes_appended: u64,
    pub blocks_yielded: u64,
    pub system_blocks_seen: u64,
    pub cache_hits: u64,
    pub false_sentinels: u64,
    pub truncated_scans: u64,
    pub skip_jumps: u64,
    pub consolidations: u64,
    pub consolidation_flushes: u64,
}
