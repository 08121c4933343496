//! Alignment-enforcing chunked view over a raw byte store.

use crate::error::{ChunkError, ChunkResult};
use crate::geometry::ChunkGeometry;
use crate::store::{ChunkRead, ChunkReadWrite};
use std::sync::Arc;
use telemount_storage::ByteStore;

/// A byte store segmented into fixed-size chunks.
///
/// Every access must cover exactly one chunk: the buffer length must
/// equal the chunk size and the offset must be chunk-aligned and
/// inside the address space. Violations fail with
/// [`ChunkError::OutOfRange`] without touching the underlying store.
///
/// The alignment contract lets all upper layers reason in whole-chunk
/// units with no partial-write handling. The store is safe for
/// concurrent access to distinct chunks; serializing access to the
/// *same* chunk is the caller's job (see [`crate::SyncedStore`]).
pub struct ChunkedStore {
    inner: Arc<dyn ByteStore>,
    geometry: ChunkGeometry,
}

impl ChunkedStore {
    /// Creates a chunked view of `inner` with the given geometry.
    pub fn new(inner: Arc<dyn ByteStore>, geometry: ChunkGeometry) -> Self {
        Self { inner, geometry }
    }

    /// Returns the chunk geometry.
    #[must_use]
    pub fn geometry(&self) -> ChunkGeometry {
        self.geometry
    }
}

impl ChunkRead for ChunkedStore {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> ChunkResult<()> {
        self.geometry.check_chunk(buf.len(), offset)?;
        self.inner.read_at(buf, offset).map_err(ChunkError::local)
    }
}

impl ChunkReadWrite for ChunkedStore {
    fn write_at(&self, data: &[u8], offset: u64) -> ChunkResult<()> {
        self.geometry.check_chunk(data.len(), offset)?;
        self.inner.write_at(data, offset).map_err(ChunkError::local)
    }

    fn sync(&self) -> ChunkResult<()> {
        self.inner.sync().map_err(ChunkError::local)
    }

    fn size(&self) -> u64 {
        self.geometry.total_size()
    }
}
