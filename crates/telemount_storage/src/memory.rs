//! In-memory storage backend for testing and RAM-backed regions.

use crate::error::{StorageError, StorageResult};
use crate::store::{ByteStore, ReadStore};
use parking_lot::RwLock;

/// An in-memory storage backend.
///
/// This backend holds the whole region in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - RAM-backed migration targets that don't need persistence
///
/// # Thread Safety
///
/// This backend is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use telemount_storage::{ByteStore, InMemoryBackend, ReadStore};
///
/// let backend = InMemoryBackend::with_data(b"test".to_vec());
/// assert_eq!(backend.size(), 4);
///
/// let mut buf = [0u8; 4];
/// backend.read_at(&mut buf, 0).unwrap();
/// assert_eq!(&buf, b"test");
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    data: RwLock<Vec<u8>>,
}

impl InMemoryBackend {
    /// Creates a new empty (zero-sized) in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a zero-filled in-memory backend of the given size.
    #[must_use]
    pub fn with_size(size: usize) -> Self {
        Self::with_data(vec![0u8; size])
    }

    /// Creates an in-memory backend with pre-existing data.
    ///
    /// The region size is `data.len()`. Useful for seeding a remote
    /// source in tests.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }

    /// Returns a copy of all data in the backend.
    ///
    /// Useful for testing and debugging.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.data.read().clone()
    }
}

impl ReadStore for InMemoryBackend {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> StorageResult<()> {
        let data = self.data.read();
        let size = data.len() as u64;
        let start = offset as usize;
        let end = start.saturating_add(buf.len());

        if offset > size || end > data.len() {
            return Err(StorageError::ReadPastEnd {
                offset,
                len: buf.len(),
                size,
            });
        }

        buf.copy_from_slice(&data[start..end]);
        Ok(())
    }
}

impl ByteStore for InMemoryBackend {
    fn write_at(&self, new_data: &[u8], offset: u64) -> StorageResult<()> {
        let mut data = self.data.write();
        let size = data.len() as u64;
        let start = offset as usize;
        let end = start.saturating_add(new_data.len());

        if offset > size || end > data.len() {
            return Err(StorageError::WritePastEnd {
                offset,
                len: new_data.len(),
                size,
            });
        }

        data[start..end].copy_from_slice(new_data);
        Ok(())
    }

    fn sync(&self) -> StorageResult<()> {
        // In-memory backend has no durability to enforce
        Ok(())
    }

    fn size(&self) -> u64 {
        self.data.read().len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_new_is_empty() {
        let backend = InMemoryBackend::new();
        assert_eq!(backend.size(), 0);
        assert!(backend.data().is_empty());
    }

    #[test]
    fn memory_with_size_is_zeroed() {
        let backend = InMemoryBackend::with_size(8);
        assert_eq!(backend.size(), 8);
        assert_eq!(backend.data(), vec![0u8; 8]);
    }

    #[test]
    fn memory_write_and_read() {
        let backend = InMemoryBackend::with_size(16);
        backend.write_at(b"hello world", 0).unwrap();

        let mut buf = [0u8; 5];
        backend.read_at(&mut buf, 0).unwrap();
        assert_eq!(&buf, b"hello");

        backend.read_at(&mut buf, 6).unwrap();
        assert_eq!(&buf, b"world");
    }

    #[test]
    fn memory_write_in_place() {
        let backend = InMemoryBackend::with_data(b"hello world".to_vec());
        backend.write_at(b"WORLD", 6).unwrap();
        assert_eq!(backend.data(), b"hello WORLD");
    }

    #[test]
    fn memory_read_past_end_fails() {
        let backend = InMemoryBackend::with_size(5);

        let mut buf = [0u8; 5];
        let result = backend.read_at(&mut buf, 10);
        assert!(matches!(result, Err(StorageError::ReadPastEnd { .. })));
    }

    #[test]
    fn memory_read_extending_past_end_fails() {
        let backend = InMemoryBackend::with_size(5);

        let mut buf = [0u8; 10];
        let result = backend.read_at(&mut buf, 3);
        assert!(matches!(result, Err(StorageError::ReadPastEnd { .. })));
    }

    #[test]
    fn memory_write_past_end_fails() {
        let backend = InMemoryBackend::with_size(5);

        let result = backend.write_at(b"too much data", 0);
        assert!(matches!(result, Err(StorageError::WritePastEnd { .. })));
        // Region is untouched
        assert_eq!(backend.data(), vec![0u8; 5]);
    }

    #[test]
    fn memory_empty_read_and_write() {
        let backend = InMemoryBackend::with_size(4);
        backend.write_at(b"", 2).unwrap();

        let mut buf = [0u8; 0];
        backend.read_at(&mut buf, 2).unwrap();
    }

    #[test]
    fn memory_sync_succeeds() {
        let backend = InMemoryBackend::with_size(4);
        backend.write_at(b"data", 0).unwrap();
        assert!(backend.sync().is_ok());
    }
}
