//! In-memory append store

use uuid::Uuid;

use super::errors::StoreResult;
use super::{check_chunk_size, chunk_window, AppendStore, DEFAULT_CHUNK_SIZE};

/// Growable in-memory byte sequence.
///
/// Holds the bytes of standalone records before they are appended elsewhere,
/// and backs the engine in tests.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    id: String,
    data: Vec<u8>,
    chunk_size: usize,
}

impl MemoryStore {
    /// Create an empty store with a random id.
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4().to_string())
    }

    /// Create an empty store with the given id.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            data: Vec::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Create a store over existing bytes (e.g. a copy of another store).
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            data,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Set the number of bytes returned per `reverse_read`.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> StoreResult<Self> {
        self.chunk_size = check_chunk_size(chunk_size)?;
        Ok(self)
    }

    /// Returns the chunk size used for backward reads.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Returns all bytes appended so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the store and returns its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AppendStore for MemoryStore {
    fn id(&self) -> &str {
        &self.id
    }

    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn append(&mut self, data: &[u8]) -> StoreResult<()> {
        self.data.extend_from_slice(data);
        Ok(())
    }

    fn reverse_read(&self, from: u64) -> StoreResult<Option<Vec<u8>>> {
        Ok(chunk_window(from, self.len(), self.chunk_size)
            .map(|(start, end)| self.data[start as usize..end as usize].to_vec()))
    }

    fn measured_reverse_read(&self, from: u64, to: u64) -> StoreResult<Option<Vec<u8>>> {
        if to > from || from > self.len() {
            return Ok(None);
        }
        Ok(Some(self.data[to as usize..from as usize].to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_grows_length() {
        let mut store = MemoryStore::with_id("mem");
        assert!(store.is_empty());

        store.append(b"abc").unwrap();
        store.append(b"de").unwrap();

        assert_eq!(store.len(), 5);
        assert_eq!(store.as_bytes(), b"abcde");
        assert_eq!(store.id(), "mem");
    }

    #[test]
    fn test_reverse_read_returns_tail_chunk() {
        let mut store = MemoryStore::new().with_chunk_size(3).unwrap();
        store.append(b"0123456789").unwrap();

        assert_eq!(store.reverse_read(10).unwrap().unwrap(), b"789");
        assert_eq!(store.reverse_read(7).unwrap().unwrap(), b"456");
        assert_eq!(store.reverse_read(2).unwrap().unwrap(), b"01");
        assert!(store.reverse_read(0).unwrap().is_none());
    }

    #[test]
    fn test_reverse_read_past_end_is_clamped() {
        let store = MemoryStore::from_bytes(b"xyz".to_vec());
        assert_eq!(store.reverse_read(100).unwrap().unwrap(), b"xyz");
    }

    #[test]
    fn test_measured_reverse_read_exact() {
        let store = MemoryStore::from_bytes(b"0123456789".to_vec());

        assert_eq!(store.measured_reverse_read(6, 2).unwrap().unwrap(), b"2345");
        assert_eq!(store.measured_reverse_read(4, 4).unwrap().unwrap(), b"");
        assert!(store.measured_reverse_read(11, 2).unwrap().is_none());
        assert!(store.measured_reverse_read(2, 6).unwrap().is_none());
    }

    #[test]
    fn test_rejects_tiny_chunk_size() {
        assert!(MemoryStore::new().with_chunk_size(1).is_err());
    }

    #[test]
    fn test_random_ids_differ() {
        assert_ne!(MemoryStore::new().id(), MemoryStore::new().id());
    }
}
