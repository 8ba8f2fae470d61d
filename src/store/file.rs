//! File-backed append store with fsync enforcement
//!
//! - Every append is followed by fsync
//! - The file is never truncated or rewritten
//! - Backward reads seek a separate read handle

use std::cell::RefCell;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::errors::StoreResult;
use super::{check_chunk_size, chunk_window, AppendStore, DEFAULT_CHUNK_SIZE};

/// Append store over a single file.
///
/// Single writer. The length is re-read from the file after every append,
/// successful or not, so bytes left behind by a failed write are counted
/// and later frames stay reachable from the tail.
#[derive(Debug)]
pub struct FileStore {
    /// Path to the block file
    path: PathBuf,
    /// Path rendered once for `id()`
    id: String,
    /// Append handle
    writer: File,
    /// Read handle (seek position changes on every read)
    reader: RefCell<File>,
    /// Current file length
    len: u64,
    /// Bytes returned per `reverse_read`
    chunk_size: usize,
}

impl FileStore {
    /// Opens or creates the block file at `path`.
    ///
    /// Creates parent directories if needed.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let writer = OpenOptions::new().create(true).append(true).open(path)?;
        let reader = File::open(path)?;
        let len = writer.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            id: path.display().to_string(),
            writer,
            reader: RefCell::new(reader),
            len,
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    /// Opens `<data_dir>/blocks/blocks.log`.
    pub fn open_from_data_dir(data_dir: &Path) -> StoreResult<Self> {
        Self::open(&data_dir.join("blocks").join("blocks.log"))
    }

    /// Set the number of bytes returned per `reverse_read`.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> StoreResult<Self> {
        self.chunk_size = check_chunk_size(chunk_size)?;
        Ok(self)
    }

    /// Bytes returned per `reverse_read`.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Returns the path of the block file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_range(&self, start: u64, end: u64) -> StoreResult<Vec<u8>> {
        let mut buf = vec![0u8; (end - start) as usize];
        let mut reader = self.reader.borrow_mut();
        reader.seek(SeekFrom::Start(start))?;
        reader.read_exact(&mut buf)?;
        Ok(buf)
    }
}

impl AppendStore for FileStore {
    fn id(&self) -> &str {
        &self.id
    }

    fn len(&self) -> u64 {
        self.len
    }

    fn append(&mut self, data: &[u8]) -> StoreResult<()> {
        let written = self
            .writer
            .write_all(data)
            // fsync - a block is not appended until it is durable
            .and_then(|()| self.writer.sync_all());
        if let Err(e) = written {
            // A partial write may have landed; the next append goes after it
            if let Ok(metadata) = self.writer.metadata() {
                self.len = metadata.len();
            }
            return Err(e.into());
        }
        self.len = self.writer.metadata()?.len();
        Ok(())
    }

    fn reverse_read(&self, from: u64) -> StoreResult<Option<Vec<u8>>> {
        match chunk_window(from, self.len, self.chunk_size) {
            Some((start, end)) => self.read_range(start, end).map(Some),
            None => Ok(None),
        }
    }

    fn measured_reverse_read(&self, from: u64, to: u64) -> StoreResult<Option<Vec<u8>>> {
        if to > from || from > self.len {
            return Ok(None);
        }
        self.read_range(to, from).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_directories() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::open_from_data_dir(temp_dir.path()).unwrap();

        assert!(temp_dir.path().join("blocks").join("blocks.log").exists());
        assert_eq!(store.len(), 0);
        assert!(store.reverse_read(0).unwrap().is_none());
    }

    #[test]
    fn test_append_and_reverse_read() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = FileStore::open_from_data_dir(temp_dir.path())
            .unwrap()
            .with_chunk_size(4)
            .unwrap();

        store.append(b"hello ").unwrap();
        store.append(b"world").unwrap();

        assert_eq!(store.len(), 11);
        assert_eq!(store.reverse_read(11).unwrap().unwrap(), b"orld");
        assert_eq!(store.reverse_read(7).unwrap().unwrap(), b"lo w");
        assert_eq!(store.measured_reverse_read(5, 0).unwrap().unwrap(), b"hello");
        assert!(store.measured_reverse_read(12, 0).unwrap().is_none());
    }

    #[test]
    fn test_stray_bytes_are_counted_by_next_append() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = FileStore::open_from_data_dir(temp_dir.path()).unwrap();
        store.append(b"first").unwrap();

        // Leftover of a write that failed after reaching the file
        let mut torn = OpenOptions::new().append(true).open(store.path()).unwrap();
        torn.write_all(b"torn").unwrap();
        drop(torn);

        store.append(b"second").unwrap();
        assert_eq!(store.len(), 15);
        assert_eq!(store.measured_reverse_read(15, 9).unwrap().unwrap(), b"second");
    }

    #[test]
    fn test_with_chunk_size() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::open_from_data_dir(temp_dir.path()).unwrap();
        assert_eq!(store.chunk_size(), DEFAULT_CHUNK_SIZE);

        let store = store.with_chunk_size(16).unwrap();
        assert_eq!(store.chunk_size(), 16);
        assert!(store.with_chunk_size(1).is_err());
    }

    #[test]
    fn test_reopen_keeps_length() {
        let temp_dir = TempDir::new().unwrap();

        {
            let mut store = FileStore::open_from_data_dir(temp_dir.path()).unwrap();
            store.append(b"persisted").unwrap();
        }

        let store = FileStore::open_from_data_dir(temp_dir.path()).unwrap();
        assert_eq!(store.len(), 9);
        assert_eq!(store.reverse_read(9).unwrap().unwrap(), b"persisted");
    }
}
