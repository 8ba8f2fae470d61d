//! Skip ranges retired by consolidation
//!
//! A skip range covers the store bytes `[to_position, from_position)`.
//! Ranges are learned only when a scan visits their marker block; nothing is
//! loaded eagerly.

use serde::{Deserialize, Serialize};

/// A consolidated byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SkipRange {
    /// Upper boundary (exclusive): where the consolidated region ends
    pub from_position: u64,
    /// Lower boundary (inclusive): where a scan resumes after the region
    pub to_position: u64,
}

impl SkipRange {
    pub fn new(from_position: u64, to_position: u64) -> Self {
        Self {
            from_position,
            to_position,
        }
    }

    /// Returns whether the range retires no bytes.
    pub fn is_empty(&self) -> bool {
        self.from_position <= self.to_position
    }

    /// Returns whether the next byte a scan at `cursor` would read is retired.
    pub fn covers(&self, cursor: u64) -> bool {
        cursor > self.to_position && cursor <= self.from_position
    }
}

/// Skip ranges discovered so far, kept in descending order of upper bound.
#[derive(Debug, Clone, Default)]
pub struct SkipRanges {
    ranges: Vec<SkipRange>,
}

impl SkipRanges {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a discovered range.
    ///
    /// Returns false if the range is empty or already known.
    pub fn record(&mut self, range: SkipRange) -> bool {
        if range.is_empty() || self.ranges.contains(&range) {
            return false;
        }
        let at = self
            .ranges
            .iter()
            .position(|r| r.from_position < range.from_position)
            .unwrap_or(self.ranges.len());
        self.ranges.insert(at, range);
        true
    }

    /// Moves a scan cursor below every known range it falls into.
    ///
    /// Returns the cursor unchanged if no range covers it.
    pub fn apply(&self, cursor: u64) -> u64 {
        let mut cursor = cursor;
        for range in &self.ranges {
            // Descending order: nothing further down can reach the cursor.
            if range.from_position < cursor {
                break;
            }
            if range.covers(cursor) {
                cursor = range.to_position;
            }
        }
        cursor
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn ranges(&self) -> &[SkipRange] {
        &self.ranges
    }

    pub fn clear(&mut self) {
        self.ranges.clear();
    }
}
