//! ObservationScope for automatic begin/complete logging
//!
//! - Logs `{name}_BEGIN` on creation
//! - Logs `{name}_COMPLETE` or `{name}_FAILED` when finished
//! - Logs `{name}_INCOMPLETE` on drop if neither happened

use std::cell::Cell;
use std::time::Instant;

use super::logger::Logger;

/// A scope that logs the start and end of a long-running operation
///
/// ```ignore
/// let scope = ObservationScope::new("CONSOLIDATION");
/// // ... do work ...
/// scope.complete_with_fields(&[("flushes", "3")]);
/// ```
pub struct ObservationScope<'a> {
    name: &'a str,
    completed: Cell<bool>,
    started: Instant,
}

impl<'a> ObservationScope<'a> {
    /// Create a new observation scope
    pub fn new(name: &'a str) -> Self {
        Logger::info(&format!("{}_BEGIN", name), &[]);
        Self {
            name,
            completed: Cell::new(false),
            started: Instant::now(),
        }
    }

    /// Milliseconds since the scope was opened
    pub fn elapsed_ms(&self) -> String {
        self.started.elapsed().as_millis().to_string()
    }

    /// Mark the scope as completed, adding `elapsed_ms` to the fields
    pub fn complete_with_fields(self, fields: &[(&str, &str)]) {
        self.completed.set(true);
        let elapsed = self.elapsed_ms();
        let mut all_fields: Vec<(&str, &str)> = fields.to_vec();
        all_fields.push(("elapsed_ms", &elapsed));
        Logger::info(&format!("{}_COMPLETE", self.name), &all_fields);
    }

    /// Mark the scope as failed with a reason
    pub fn fail(self, reason: &str) {
        self.completed.set(true);
        Logger::error(&format!("{}_FAILED", self.name), &[("reason", reason)]);
    }

    /// Check if the scope has been completed
    pub fn is_completed(&self) -> bool {
        self.completed.get()
    }
}

impl Drop for ObservationScope<'_> {
    fn drop(&mut self) {
        if !self.completed.get() {
            Logger::warn(
                &format!("{}_INCOMPLETE", self.name),
                &[("reason", "scope dropped without completion")],
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_lifecycle() {
        let scope = ObservationScope::new("TEST");
        assert!(!scope.is_completed());
        scope.complete_with_fields(&[("result", "ok")]);
    }

    #[test]
    fn test_scope_fail() {
        let scope = ObservationScope::new("TEST");
        scope.fail("merge rejected");
    }

    #[test]
    fn test_scope_drop_without_complete() {
        let scope = ObservationScope::new("TEST");
        drop(scope);
    }

    #[test]
    fn test_elapsed_is_numeric() {
        let scope = ObservationScope::new("TEST");
        let ms: u64 = scope.elapsed_ms().parse().unwrap();
        assert!(ms < 60_000);
        scope.complete_with_fields(&[]);
    }
}
