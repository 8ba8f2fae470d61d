//! # Store Errors

use std::io;

use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Backing store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid chunk size: {0} (minimum: {1})")]
    InvalidChunkSize(usize, usize),
}

impl StoreError {
    /// Whether the error came from the operating system rather than from
    /// the store's own configuration.
    pub fn is_io(&self) -> bool {
        matches!(self, StoreError::Io(_))
    }
}
