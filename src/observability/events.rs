//! Observability events for blocklog
//!
//! Events are explicit and typed.

use std::fmt;

use super::logger::Severity;

/// Observable events in the block engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Appends
    /// Block frame appended to the store
    BlockAppend,

    // Scans
    /// Scan reached the scan floor or the start of the store
    ScanComplete,
    /// Scan ended early on a torn or unreadable frame
    ScanTruncated,
    /// Sentinel match whose preamble failed verification
    FalseSentinel,
    /// Skip marker visited and its range recorded
    SkipRangeDiscovered,

    // Consolidation
    /// Merged block and skip marker appended
    ConsolidationFlush,
    /// Decode cache cleared
    CacheInvalidated,

    // Store
    /// Backing store failed a read or append (FATAL)
    StoreFailure,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::BlockAppend => "BLOCK_APPEND",
            Event::ScanComplete => "SCAN_COMPLETE",
            Event::ScanTruncated => "SCAN_TRUNCATED",
            Event::FalseSentinel => "FALSE_SENTINEL",
            Event::SkipRangeDiscovered => "SKIP_RANGE_DISCOVERED",
            Event::ConsolidationFlush => "CONSOLIDATION_FLUSH",
            Event::CacheInvalidated => "CACHE_INVALIDATED",
            Event::StoreFailure => "STORE_FAILURE",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::BlockAppend
            | Event::ScanComplete
            | Event::FalseSentinel
            | Event::SkipRangeDiscovered
            | Event::CacheInvalidated => Severity::Trace,
            Event::ConsolidationFlush => Severity::Info,
            Event::ScanTruncated => Severity::Warn,
            Event::StoreFailure => Severity::Fatal,
        }
    }

    /// Returns true if this event indicates a fatal condition
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
