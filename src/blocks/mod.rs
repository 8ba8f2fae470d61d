//! Block subsystem for blocklog
//!
//! Records are appended to an [`AppendStore`](crate::store::AppendStore) as
//! self-describing frames and recovered by scanning backward from the tail.
//! There is no index: frame boundaries are found by the preamble sentinel.
//!
//! # Frame layout (ascending offsets)
//!
//! ```text
//! [body][header][header_len u32][body_len u32][type u32][crc u16][crc u16][0x23 0x21]
//! ```
//!
//! # Invariants
//!
//! - Bytes are never rewritten; consolidation only appends
//! - Types below 100 are bookkeeping and never reach callers
//! - A preamble is trusted only after both checksums and the sentinel verify
//! - A scan ends quietly on torn or unreadable frames

mod checksum;
mod consolidate;
mod engine;
mod errors;
mod frame;
mod record;
mod registry;
mod scanner;
mod skip;

pub use checksum::{compute_checksum, verify_checksum};
pub use consolidate::ConsolidationReport;
pub use engine::{Blocks, Scan};
pub use errors::{BlockError, BlockErrorCode, BlockResult, Severity};
pub use frame::{encode, Preamble, PREAMBLE_LEN, SENTINEL};
pub use record::{Block, Payload, Record, SkipMarker, SKIP_BLOCK_TYPE, SKIP_HEADER_LEN, SYSTEM_TYPE_THRESHOLD};
pub use registry::{BlockKind, BlockRegistry};
pub use scanner::ScanState;
pub use skip::{SkipRange, SkipRanges};
