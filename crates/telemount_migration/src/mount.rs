//! Device mount collaborator contract.

use crate::error::{MigrationError, MigrationResult};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use telemount_chunks::ChunkReadWrite;

/// Turns a random-access byte store into a block device path.
///
/// This trait abstracts the kernel attachment layer, allowing for
/// different implementations (NBD, ublk, a mock for testing, etc.).
/// The engine hands the mount its fully wired store and only cares
/// about the resulting path.
///
/// # Memory-mapped (slice) mounts
///
/// An implementation that maps the device into memory **must** pin
/// the mapping (lock it against paging) for the whole session. An
/// unpinned mapping can fault on a page whose handler is the very
/// block device being served, deadlocking the driver. The pin must be
/// released in `close`.
pub trait DeviceMount: Send + Sync {
    /// Attaches `store` to a free device slot and returns its path.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::NoFreeDevice`] if no slot is
    /// available, or the underlying attachment error.
    fn open(&self, store: Arc<dyn ChunkReadWrite>) -> MigrationResult<PathBuf>;

    /// Detaches the device.
    ///
    /// # Errors
    ///
    /// Returns an error if the detachment fails.
    fn close(&self) -> MigrationResult<()>;
}

/// An in-memory device mount for testing.
///
/// Instead of attaching a kernel device it simply keeps the store and
/// hands back a synthetic path; tests drive "device I/O" directly
/// through [`MemoryDeviceMount::store`].
pub struct MemoryDeviceMount {
    available: AtomicBool,
    mounted: Mutex<Option<Arc<dyn ChunkReadWrite>>>,
    path: PathBuf,
}

impl Default for MemoryDeviceMount {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDeviceMount {
    /// Creates a new mount with a free slot.
    #[must_use]
    pub fn new() -> Self {
        Self {
            available: AtomicBool::new(true),
            mounted: Mutex::new(None),
            path: PathBuf::from("/dev/telemount0"),
        }
    }

    /// Marks the slot as available or exhausted.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Returns the currently mounted store, if any.
    #[must_use]
    pub fn store(&self) -> Option<Arc<dyn ChunkReadWrite>> {
        self.mounted.lock().clone()
    }

    /// Returns the synthetic device path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DeviceMount for MemoryDeviceMount {
    fn open(&self, store: Arc<dyn ChunkReadWrite>) -> MigrationResult<PathBuf> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(MigrationError::NoFreeDevice);
        }

        *self.mounted.lock() = Some(store);
        Ok(self.path.clone())
    }

    fn close(&self) -> MigrationResult<()> {
        *self.mounted.lock() = None;
        Ok(())
    }
}
