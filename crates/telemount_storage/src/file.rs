//! File-based storage backend for persistent regions.

use crate::error::{StorageError, StorageResult};
use crate::store::{ByteStore, ReadStore};
use fs2::FileExt;
use parking_lot::RwLock;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A file-based storage backend.
///
/// This backend provides a persistent fixed-size region using OS file
/// APIs. Data survives process restarts.
///
/// # Durability
///
/// - `sync()` calls `File::sync_all()` to ensure data is on disk
///
/// # Thread Safety
///
/// This backend is thread-safe and can be shared across threads.
/// Internal locking serializes access to the file cursor.
///
/// # Ownership
///
/// A migration destination must be the only writer of its local image.
/// [`FileBackend::open_exclusive`] acquires an advisory exclusive lock
/// that is held for the backend's lifetime; a second opener fails with
/// [`StorageError::Locked`].
///
/// # Example
///
/// ```no_run
/// use telemount_storage::{ByteStore, FileBackend};
/// use std::path::Path;
///
/// let backend = FileBackend::open_sized(Path::new("image.bin"), 4096).unwrap();
/// backend.write_at(b"persistent data", 0).unwrap();
/// backend.sync().unwrap();  // Ensure data is durable
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    file: RwLock<File>,
    size: u64,
    locked: bool,
}

impl FileBackend {
    /// Opens an existing file as a region.
    ///
    /// The region size is the file's current length.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let size = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file: RwLock::new(file),
            size,
            locked: false,
        })
    }

    /// Opens or creates a file and sizes the region to `size` bytes.
    ///
    /// A new or shorter file is extended with zeros; a longer file
    /// keeps its data and only the first `size` bytes are addressable.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or sized.
    pub fn open_sized(path: &Path, size: u64) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        if file.metadata()?.len() < size {
            file.set_len(size)?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            file: RwLock::new(file),
            size,
            locked: false,
        })
    }

    /// Like [`FileBackend::open_sized`], additionally taking an
    /// advisory exclusive lock on the file.
    ///
    /// The lock is held until the backend is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Locked`] if another process holds the
    /// lock.
    pub fn open_exclusive(path: &Path, size: u64) -> StorageResult<Self> {
        let mut backend = Self::open_sized(path, size)?;

        if backend.file.get_mut().try_lock_exclusive().is_err() {
            return Err(StorageError::Locked);
        }
        backend.locked = true;

        Ok(backend)
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileBackend {
    fn drop(&mut self) {
        if self.locked {
            let _ = FileExt::unlock(self.file.get_mut());
        }
    }
}

impl ReadStore for FileBackend {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> StorageResult<()> {
        let end = offset.saturating_add(buf.len() as u64);
        if offset > self.size || end > self.size {
            return Err(StorageError::ReadPastEnd {
                offset,
                len: buf.len(),
                size: self.size,
            });
        }

        if buf.is_empty() {
            return Ok(());
        }

        let mut file = self.file.write();
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)?;

        Ok(())
    }
}

impl ByteStore for FileBackend {
    fn write_at(&self, data: &[u8], offset: u64) -> StorageResult<()> {
        let end = offset.saturating_add(data.len() as u64);
        if offset > self.size || end > self.size {
            return Err(StorageError::WritePastEnd {
                offset,
                len: data.len(),
                size: self.size,
            });
        }

        if data.is_empty() {
            return Ok(());
        }

        let mut file = self.file.write();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;

        Ok(())
    }

    fn sync(&self) -> StorageResult<()> {
        let file = self.file.write();
        file.sync_all()?;
        Ok(())
    }

    fn size(&self) -> u64 {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_open_sized_creates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.bin");

        let backend = FileBackend::open_sized(&path, 64).unwrap();
        assert_eq!(backend.size(), 64);
        assert!(path.exists());
    }

    #[test]
    fn file_write_and_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.bin");

        let backend = FileBackend::open_sized(&path, 16).unwrap();
        backend.write_at(b"hello world", 0).unwrap();

        let mut buf = [0u8; 5];
        backend.read_at(&mut buf, 6).unwrap();
        assert_eq!(&buf, b"world");
    }

    #[test]
    fn file_new_region_reads_zeros() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.bin");

        let backend = FileBackend::open_sized(&path, 8).unwrap();

        let mut buf = [0xFFu8; 8];
        backend.read_at(&mut buf, 0).unwrap();
        assert_eq!(buf, [0u8; 8]);
    }

    #[test]
    fn file_read_past_end_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.bin");

        let backend = FileBackend::open_sized(&path, 5).unwrap();

        let mut buf = [0u8; 5];
        let result = backend.read_at(&mut buf, 10);
        assert!(matches!(result, Err(StorageError::ReadPastEnd { .. })));
    }

    #[test]
    fn file_write_past_end_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.bin");

        let backend = FileBackend::open_sized(&path, 5).unwrap();

        let result = backend.write_at(b"too much data", 0);
        assert!(matches!(result, Err(StorageError::WritePastEnd { .. })));
    }

    #[test]
    fn file_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.bin");

        // Write data
        {
            let backend = FileBackend::open_sized(&path, 15).unwrap();
            backend.write_at(b"persistent data", 0).unwrap();
            backend.sync().unwrap();
        }

        // Reopen and read
        {
            let backend = FileBackend::open(&path).unwrap();
            assert_eq!(backend.size(), 15);

            let mut buf = [0u8; 15];
            backend.read_at(&mut buf, 0).unwrap();
            assert_eq!(&buf, b"persistent data");
        }
    }

    #[test]
    fn file_exclusive_lock_blocks_second_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.bin");

        let first = FileBackend::open_exclusive(&path, 16).unwrap();

        let second = FileBackend::open_exclusive(&path, 16);
        assert!(matches!(second, Err(StorageError::Locked)));

        // Lock is released on drop
        drop(first);
        assert!(FileBackend::open_exclusive(&path, 16).is_ok());
    }

    #[test]
    fn file_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.bin");

        let backend = FileBackend::open_sized(&path, 4).unwrap();
        assert_eq!(backend.path(), path);
    }
}
