//! Block error types
//!
//! Error codes:
//! - BLOCK_INVALID_ARGUMENT (ERROR severity)
//! - BLOCK_NOT_MERGEABLE (ERROR severity)
//! - BLOCK_TRUNCATED (ERROR severity, absorbed by scans)
//! - BLOCK_CHECKSUM_MISMATCH (ERROR severity, absorbed by scans)
//! - BLOCK_STORE_FAILED (FATAL severity)

use std::fmt;

use crate::store::StoreError;

/// Severity levels for block errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation fails, engine remains usable
    Error,
    /// Backing store is unusable
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Block-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockErrorCode {
    /// Field out of range, reserved type, or invalid configuration
    BlockInvalidArgument,
    /// Records cannot be combined
    BlockNotMergeable,
    /// A backward read could not complete a frame
    BlockTruncated,
    /// Preamble failed verification
    BlockChecksumMismatch,
    /// The backing store failed
    BlockStoreFailed,
}

impl BlockErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            BlockErrorCode::BlockInvalidArgument => "BLOCK_INVALID_ARGUMENT",
            BlockErrorCode::BlockNotMergeable => "BLOCK_NOT_MERGEABLE",
            BlockErrorCode::BlockTruncated => "BLOCK_TRUNCATED",
            BlockErrorCode::BlockChecksumMismatch => "BLOCK_CHECKSUM_MISMATCH",
            BlockErrorCode::BlockStoreFailed => "BLOCK_STORE_FAILED",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            BlockErrorCode::BlockStoreFailed => Severity::Fatal,
            _ => Severity::Error,
        }
    }

    /// Whether a scan ends quietly on this error instead of surfacing it.
    ///
    /// A torn tail or a coincidental sentinel is the expected shape of an
    /// interrupted append.
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            BlockErrorCode::BlockTruncated | BlockErrorCode::BlockChecksumMismatch
        )
    }
}

impl fmt::Display for BlockErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Block error with context
#[derive(Debug)]
pub struct BlockError {
    /// Error code
    code: BlockErrorCode,
    /// Human-readable message
    message: String,
    /// Optional details about the error context
    details: Option<String>,
    /// Underlying store error if applicable
    source: Option<StoreError>,
}

impl BlockError {
    /// Create an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(BlockErrorCode::BlockInvalidArgument, message)
    }

    /// Create a not-mergeable error
    pub fn not_mergeable(message: impl Into<String>) -> Self {
        Self::new(BlockErrorCode::BlockNotMergeable, message)
    }

    /// Create a truncation error at a store position
    pub fn truncated_at(position: u64, reason: impl Into<String>) -> Self {
        Self::new(BlockErrorCode::BlockTruncated, reason).with_position(position)
    }

    /// Create a checksum mismatch error at a store position
    pub fn checksum_mismatch_at(position: u64, reason: impl Into<String>) -> Self {
        Self::new(BlockErrorCode::BlockChecksumMismatch, reason).with_position(position)
    }

    /// Create a store failure error
    pub fn store_failed(message: impl Into<String>, source: StoreError) -> Self {
        Self {
            code: BlockErrorCode::BlockStoreFailed,
            message: message.into(),
            details: None,
            source: Some(source),
        }
    }

    fn new(code: BlockErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    fn with_position(mut self, position: u64) -> Self {
        self.details = Some(format!("store_position: {}", position));
        self
    }

    /// Returns the error code
    pub fn code(&self) -> BlockErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns additional error details
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Returns whether this error is fatal
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for BlockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        if let Some(ref source) = self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for BlockError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for block operations
pub type BlockResult<T> = Result<T, BlockError>;
