//! Background worker pool that drains the remote into the local store.

use crate::cancel::CancelToken;
use crate::error::{ChunkError, ChunkResult};
use crate::geometry::ChunkGeometry;
use crate::store::ChunkRead;
use parking_lot::{Condvar, Mutex};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Pull ordering heuristic: maps a chunk offset to a priority.
///
/// Smaller values are pulled first; ties break toward the numerically
/// smaller offset. Canonical choices are a constant (any order), the
/// offset itself (linear), its negation (reverse), or an
/// application-specific access prediction.
pub type PullPriority = Box<dyn Fn(u64) -> i64 + Send + Sync>;

/// Interval at which parked workers re-check the cancellation token.
const PARK_INTERVAL: Duration = Duration::from_millis(100);

/// Queue and progress state shared by the workers, all under one lock.
struct PullState {
    /// Pending chunk offsets, keyed by `(priority, offset)`.
    queue: BinaryHeap<Reverse<(i64, u64)>>,
    /// Offsets currently being fetched by a worker.
    in_flight: u64,
    /// Chunks accounted as pulled in the current epoch.
    pulled: u64,
    /// Chunks the current epoch must account for before completion.
    target: u64,
    finalized: bool,
    shutdown: bool,
    failed: bool,
    /// First worker error; consumed by [`Puller::wait`].
    first_error: Option<ChunkError>,
}

impl PullState {
    /// Completion: finalization has happened and nothing is pending.
    ///
    /// The drain conditions subsume the pulled-vs-target accounting
    /// when finalization raced the initial drain, so a dirty chunk can
    /// never be left queued at completion.
    fn complete(&self) -> bool {
        self.finalized
            && self.pulled >= self.target
            && self.queue.is_empty()
            && self.in_flight == 0
    }

    fn fail(&mut self, error: ChunkError) {
        if !self.failed {
            self.failed = true;
            self.first_error = Some(error);
        }
    }
}

struct Shared {
    store: Arc<dyn ChunkRead>,
    geometry: ChunkGeometry,
    priority: PullPriority,
    token: CancelToken,
    state: Mutex<PullState>,
    cond: Condvar,
}

/// Proactively walks all chunks in priority order, reading each one
/// through the synced store so it is promoted to local.
///
/// The puller owns a priority queue seeded with every chunk offset and
/// a pool of worker threads. Each worker dequeues an offset and issues
/// a whole-chunk read; if user traffic already promoted that chunk the
/// read is a cheap local no-op, so a pull never overwrites local
/// bytes.
///
/// # Lifecycle
///
/// Created inert; [`Puller::open`] spawns the workers;
/// [`Puller::finalize_pull`] re-opens the dirty set exactly once;
/// [`Puller::wait`] blocks until the post-finalization epoch has
/// drained or a worker failed; [`Puller::close`] shuts the pool down
/// and joins every worker.
pub struct Puller {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Puller {
    /// Creates a puller over `store` with the queue seeded with every
    /// chunk offset, ordered by `priority`.
    pub fn new(
        token: CancelToken,
        store: Arc<dyn ChunkRead>,
        geometry: ChunkGeometry,
        priority: PullPriority,
    ) -> Self {
        let queue = geometry
            .offsets()
            .map(|offset| Reverse((priority(offset), offset)))
            .collect();

        let state = PullState {
            queue,
            in_flight: 0,
            pulled: 0,
            target: geometry.chunk_count(),
            finalized: false,
            shutdown: false,
            failed: false,
            first_error: None,
        };

        Self {
            shared: Arc::new(Shared {
                store,
                geometry,
                priority,
                token,
                state: Mutex::new(state),
                cond: Condvar::new(),
            }),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Spawns `workers` worker threads and returns immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if `workers` is zero or the puller was already
    /// opened.
    pub fn open(&self, workers: u64) -> ChunkResult<()> {
        if workers == 0 {
            return Err(ChunkError::invalid_operation(
                "puller needs at least one worker",
            ));
        }

        let mut handles = self.workers.lock();
        if !handles.is_empty() {
            return Err(ChunkError::invalid_operation("puller already open"));
        }

        for _ in 0..workers {
            let shared = Arc::clone(&self.shared);
            handles.push(thread::spawn(move || worker_loop(&shared)));
        }

        Ok(())
    }

    /// Finalizes the pull with the chunks the source dirtied during
    /// migration.
    ///
    /// Pre-finalization pulls are treated as having satisfied every
    /// non-dirty chunk; the dirty offsets are re-enqueued and pulled
    /// once more. The caller must have re-marked those chunks as
    /// remote on the synced store *before* calling this, so the
    /// workers observe remote authority.
    ///
    /// # Errors
    ///
    /// Returns an error if finalization already happened or an offset
    /// is misaligned or out of bounds.
    pub fn finalize_pull(&self, dirty: &[u64]) -> ChunkResult<()> {
        let mut state = self.shared.state.lock();
        if state.finalized {
            return Err(ChunkError::invalid_operation("pull already finalized"));
        }

        for &offset in dirty {
            self.shared.geometry.check_offset(offset)?;
        }

        state.pulled = state.target.saturating_sub(dirty.len() as u64);
        for &offset in dirty {
            let priority = (self.shared.priority)(offset);
            state.queue.push(Reverse((priority, offset)));
        }
        state.finalized = true;

        self.shared.cond.notify_all();
        Ok(())
    }

    /// Blocks until every chunk of the finalized epoch has been
    /// pulled, or a worker has failed, or the puller was closed.
    ///
    /// # Errors
    ///
    /// Returns the first error a worker reported (cancellation
    /// surfaces as [`ChunkError::Cancelled`]).
    pub fn wait(&self) -> ChunkResult<()> {
        let mut state = self.shared.state.lock();
        loop {
            if state.failed {
                return Err(state.first_error.take().unwrap_or(ChunkError::Cancelled));
            }
            if state.shutdown || state.complete() {
                return Ok(());
            }
            self.shared.cond.wait(&mut state);
        }
    }

    /// Signals shutdown and joins all workers. Idempotent.
    pub fn close(&self) {
        {
            let mut state = self.shared.state.lock();
            state.shutdown = true;
            self.shared.cond.notify_all();
        }

        let handles: Vec<_> = self.workers.lock().drain(..).collect();
        for handle in handles {
            let _ = handle.join();
        }
    }

    /// Returns the number of chunks accounted as pulled in the
    /// current epoch.
    #[must_use]
    pub fn pulled(&self) -> u64 {
        self.shared.state.lock().pulled
    }
}

impl Drop for Puller {
    fn drop(&mut self) {
        self.close();
    }
}

fn worker_loop(shared: &Shared) {
    let mut scratch = vec![0u8; shared.geometry.chunk_size() as usize];

    loop {
        // Dequeue checkpoint: take the next offset, park when the
        // queue is empty pre-finalization, exit when drained
        // post-finalization.
        let offset = {
            let mut state = shared.state.lock();
            loop {
                if state.shutdown || state.failed {
                    return;
                }
                if shared.token.is_cancelled() {
                    state.fail(ChunkError::Cancelled);
                    shared.cond.notify_all();
                    return;
                }
                if let Some(Reverse((_, offset))) = state.queue.pop() {
                    state.in_flight += 1;
                    break offset;
                }
                if state.finalized {
                    return;
                }
                // Bounded wait so a cancellation without new work is
                // still observed.
                shared.cond.wait_for(&mut state, PARK_INTERVAL);
            }
        };

        let result = shared.store.read_at(&mut scratch, offset);

        let mut state = shared.state.lock();
        state.in_flight -= 1;
        match result {
            Ok(()) => {
                state.pulled += 1;
                if state.complete() {
                    shared.cond.notify_all();
                }
            }
            Err(error) => {
                state.fail(error);
                shared.cond.notify_all();
                return;
            }
        }
    }
}
