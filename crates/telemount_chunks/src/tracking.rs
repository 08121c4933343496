//! Dirty-chunk tracking for the source side of a migration.

use crate::error::ChunkResult;
use crate::geometry::ChunkGeometry;
use crate::store::{ChunkRead, ChunkReadWrite};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;

/// A store wrapper that records which chunks have been written.
///
/// The source host keeps serving its resource during migration; every
/// chunk it mutates after handoff must eventually be re-transferred.
/// `TrackingStore` sits in the source's write path and records the
/// aligned offset of every chunk a successful write touches.
/// [`TrackingStore::flush`] drains the recorded set - it is the
/// natural implementation of the flush callback the destination's
/// finalization consumes.
///
/// Reads are forwarded untouched.
pub struct TrackingStore {
    inner: Arc<dyn ChunkReadWrite>,
    geometry: ChunkGeometry,
    dirty: Mutex<BTreeSet<u64>>,
}

impl TrackingStore {
    /// Creates a tracking wrapper over `inner`.
    pub fn new(inner: Arc<dyn ChunkReadWrite>, geometry: ChunkGeometry) -> Self {
        Self {
            inner,
            geometry,
            dirty: Mutex::new(BTreeSet::new()),
        }
    }

    /// Drains and returns the dirtied chunk offsets, in address order.
    ///
    /// After this call the tracked set is empty; subsequent writes
    /// start a fresh set.
    pub fn flush(&self) -> Vec<u64> {
        std::mem::take(&mut *self.dirty.lock()).into_iter().collect()
    }

    /// Returns the number of currently dirty chunks.
    #[must_use]
    pub fn dirty_count(&self) -> usize {
        self.dirty.lock().len()
    }
}

impl ChunkRead for TrackingStore {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> ChunkResult<()> {
        self.inner.read_at(buf, offset)
    }
}

impl ChunkReadWrite for TrackingStore {
    fn write_at(&self, data: &[u8], offset: u64) -> ChunkResult<()> {
        self.inner.write_at(data, offset)?;
        if data.is_empty() {
            return Ok(());
        }

        // Record every chunk the write touched, only after it landed.
        let chunk_size = self.geometry.chunk_size();
        let first = offset - offset % chunk_size;
        let last = offset + data.len() as u64 - 1;
        let mut dirty = self.dirty.lock();
        let mut chunk = first;
        while chunk <= last {
            dirty.insert(chunk);
            chunk += chunk_size;
        }

        Ok(())
    }

    fn sync(&self) -> ChunkResult<()> {
        self.inner.sync()
    }

    fn size(&self) -> u64 {
        self.geometry.total_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunked::ChunkedStore;
    use telemount_storage::{ByteStore, InMemoryBackend};

    fn tracking(chunk_size: u64, chunk_count: u64) -> TrackingStore {
        let geometry = ChunkGeometry::new(chunk_size, chunk_count).unwrap();
        let backend = Arc::new(InMemoryBackend::with_size(geometry.total_size() as usize));
        let chunked = Arc::new(ChunkedStore::new(backend as Arc<dyn ByteStore>, geometry));
        TrackingStore::new(chunked, geometry)
    }

    #[test]
    fn writes_record_chunk_offsets() {
        let store = tracking(4, 3);

        store.write_at(b"test", 4).unwrap();
        assert_eq!(store.dirty_count(), 1);
        assert_eq!(store.flush(), vec![4]);
    }

    #[test]
    fn repeated_writes_deduplicate() {
        let store = tracking(4, 3);

        store.write_at(b"aaaa", 8).unwrap();
        store.write_at(b"bbbb", 8).unwrap();
        store.write_at(b"cccc", 0).unwrap();

        assert_eq!(store.flush(), vec![0, 8]);
    }

    #[test]
    fn flush_drains_the_set() {
        let store = tracking(4, 2);

        store.write_at(b"test", 0).unwrap();
        assert_eq!(store.flush(), vec![0]);
        assert_eq!(store.flush(), Vec::<u64>::new());

        store.write_at(b"more", 4).unwrap();
        assert_eq!(store.flush(), vec![4]);
    }

    #[test]
    fn failed_write_records_nothing() {
        let store = tracking(4, 2);

        // Misaligned write is rejected below and must not be tracked
        assert!(store.write_at(b"test", 2).is_err());
        assert_eq!(store.dirty_count(), 0);
    }

    #[test]
    fn reads_are_not_tracked() {
        let store = tracking(4, 2);

        let mut buf = [0u8; 4];
        store.read_at(&mut buf, 0).unwrap();
        assert_eq!(store.dirty_count(), 0);
    }
}
