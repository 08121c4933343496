//! Chunk-layer store traits.
//!
//! These are the seams the engine layers stack at: the puller only
//! needs to read, the device mount needs the full read/write surface.

use crate::error::ChunkResult;

/// A readable chunk-layer store.
pub trait ChunkRead: Send + Sync {
    /// Reads exactly `buf.len()` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the access is out of range or an underlying
    /// store fails.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> ChunkResult<()>;
}

/// A readable and writable chunk-layer store.
pub trait ChunkReadWrite: ChunkRead {
    /// Writes `data` starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the access is out of range or an underlying
    /// store fails.
    fn write_at(&self, data: &[u8], offset: u64) -> ChunkResult<()>;

    /// Syncs all written data down to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying sync fails.
    fn sync(&self) -> ChunkResult<()>;

    /// Returns the size of the address space in bytes.
    fn size(&self) -> u64;
}
