//! Backing store contract for blocklog
//!
//! The block engine never sees a file, a socket or a buffer directly. It only
//! talks to an [`AppendStore`]: a byte sequence that grows at the end and can
//! be read backward from any offset.
//!
//! # Offsets
//!
//! All positions are absolute byte offsets. A read "from" a position returns
//! bytes ending just before that position, so `from` is an exclusive end and
//! `reverse_read(store.len())` returns the newest bytes.
//!
//! # Implementations
//!
//! - [`MemoryStore`]: growable in-memory buffer, used for standalone records
//!   and tests
//! - [`FileStore`]: single append-only file, fsync after every append

mod errors;
mod file;
mod memory;

pub use errors::{StoreError, StoreResult};
pub use file::FileStore;
pub use memory::MemoryStore;

/// Default number of bytes returned by one `reverse_read` call.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Smallest chunk the bundled stores accept (the sentinel length).
pub const MIN_CHUNK_SIZE: usize = 2;

/// Append-only byte sequence readable backward from the tail.
///
/// Implementations must never rewrite or remove bytes once appended.
pub trait AppendStore {
    /// Identifier used in logs and error messages.
    fn id(&self) -> &str;

    /// Current size in bytes.
    fn len(&self) -> u64;

    /// Returns whether the store holds no bytes.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends `data` at the end of the store.
    fn append(&mut self, data: &[u8]) -> StoreResult<()>;

    /// Returns an implementation-sized chunk of bytes ending at `from`.
    ///
    /// Returns `Ok(None)` when nothing is available before `from`.
    fn reverse_read(&self, from: u64) -> StoreResult<Option<Vec<u8>>>;

    /// Returns exactly the bytes `[to, from)`.
    ///
    /// Returns `Ok(None)` when the range cannot be satisfied (inverted or
    /// past the end of the store).
    fn measured_reverse_read(&self, from: u64, to: u64) -> StoreResult<Option<Vec<u8>>>;
}

/// Validates a chunk size for the bundled stores.
pub(crate) fn check_chunk_size(chunk_size: usize) -> StoreResult<usize> {
    if chunk_size < MIN_CHUNK_SIZE {
        return Err(StoreError::InvalidChunkSize(chunk_size, MIN_CHUNK_SIZE));
    }
    Ok(chunk_size)
}

/// Clamps a backward read ending at `from` to the store bounds.
///
/// Returns the `[start, end)` window, or `None` if it is empty.
pub(crate) fn chunk_window(from: u64, len: u64, chunk_size: usize) -> Option<(u64, u64)> {
    let end = from.min(len);
    if end == 0 {
        return None;
    }
    let start = end.saturating_sub(chunk_size as u64);
    Some((start, end))
}
