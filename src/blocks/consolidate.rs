//! Consolidation
//!
//! Folds consecutive user blocks into merged blocks and retires the source blocks
//! without rewriting anything:
//!
//! ```text
//!   before:  [A][B][C]                           <- tail
//!   after:   [A][B][C][ABC][skip: end(C) -> 0]   <- tail
//! ```
//!
//! A flush appends the merged block followed by a skip marker covering every
//! byte between the previous flush boundary and the oldest merged block. The
//! next scan reads the merged block, meets the marker's range and jumps over
//! the source blocks.

use serde::Serialize;

use super::engine::Blocks;
use super::errors::BlockResult;
use super::record::{Block, SkipMarker};
use super::scanner::ScanState;
use crate::observability::{log_event_with_fields, Event, ObservationScope};
use crate::store::AppendStore;

/// Outcome of one consolidation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConsolidationReport {
    /// User blocks folded into merged blocks
    pub blocks_merged: u64,
    /// Merged blocks appended (each followed by a skip marker)
    pub flushes: u64,
    /// Frame bytes appended, markers included
    pub bytes_appended: u64,
}

impl<S: AppendStore> Blocks<S> {
    /// Merges user blocks newest-first and appends the results.
    ///
    /// `should_flush` sees the accumulated block after every fold; returning
    /// true writes it out and starts a new group. A non-empty group is always
    /// written when the scan ends.
    ///
    /// # Errors
    ///
    /// - `BLOCK_NOT_MERGEABLE` if two blocks cannot be combined; earlier
    ///   flushes stay appended
    /// - `BLOCK_STORE_FAILED` if the store fails during the scan or an append
    pub fn consolidate<F>(&mut self, should_flush: F) -> BlockResult<ConsolidationReport>
    where
        F: FnMut(&Block) -> bool,
    {
        let scope = ObservationScope::new("CONSOLIDATION");
        let result = self.run_consolidation(should_flush);
        self.settle_cache();
        match result {
            Ok(report) => {
                self.metrics().increment_consolidations();
                scope.complete_with_fields(&[
                    ("blocks_merged", &report.blocks_merged.to_string()),
                    ("flushes", &report.flushes.to_string()),
                    ("bytes_appended", &report.bytes_appended.to_string()),
                ]);
                Ok(report)
            }
            Err(e) => {
                scope.fail(&e.to_string());
                Err(e)
            }
        }
    }

    fn run_consolidation<F>(&mut self, mut should_flush: F) -> BlockResult<ConsolidationReport>
    where
        F: FnMut(&Block) -> bool,
    {
        let mut report = ConsolidationReport::default();
        let mut state = ScanState::start(&self.scan_context());
        let mut boundary = state.cursor();
        let mut pending: Option<(Block, u64)> = None;

        loop {
            let next = state.next(&mut self.scan_context());
            let Some((older, resume)) = next else { break };
            report.blocks_merged += 1;
            let merged = match pending.take() {
                Some((newer, _)) => older.merge(&newer, self.store())?,
                None => older,
            };

            if should_flush(&merged) {
                self.flush(&merged, boundary, resume, &mut report)?;
                boundary = resume;
            } else {
                pending = Some((merged, resume));
            }
        }

        if let Some(e) = state.take_error() {
            if e.is_fatal() {
                return Err(e);
            }
        }
        if let Some((merged, resume)) = pending {
            self.flush(&merged, boundary, resume, &mut report)?;
        }
        Ok(report)
    }

    /// Appends a merged block and the marker retiring `[to, from)`.
    fn flush(
        &mut self,
        merged: &Block,
        from: u64,
        to: u64,
        report: &mut ConsolidationReport,
    ) -> BlockResult<()> {
        let marker = SkipMarker::new(from, to);
        let written = self.append(merged)? + self.append_frame(marker.block())?;
        self.invalidate_cache();

        report.flushes += 1;
        report.bytes_appended += written;
        self.metrics().increment_consolidation_flushes();
        log_event_with_fields(
            Event::ConsolidationFlush,
            &[
                ("block_type", &merged.block_type().to_string()),
                ("from_position", &from.to_string()),
                ("to_position", &to.to_string()),
            ],
        );
        Ok(())
    }
}
