//! Destination configuration and hooks.

use telemount_chunks::{ChunkLocalHook, PullPriority};

/// Configuration for a migration destination.
#[derive(Debug, Clone)]
pub struct Options {
    /// Size of a chunk in bytes. Zero is corrected to the default.
    pub chunk_size: u64,

    /// Number of background pull workers. Zero is corrected to the
    /// default.
    pub pull_workers: u64,

    /// Whether to log per-chunk promotions. Diagnostics only; no
    /// semantic effect.
    pub verbose: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            chunk_size: 4096,
            pull_workers: 512,
            verbose: false,
        }
    }
}

impl Options {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the chunk size in bytes.
    #[must_use]
    pub const fn chunk_size(mut self, size: u64) -> Self {
        self.chunk_size = size;
        self
    }

    /// Sets the number of background pull workers.
    #[must_use]
    pub const fn pull_workers(mut self, workers: u64) -> Self {
        self.pull_workers = workers;
        self
    }

    /// Sets verbose promotion logging.
    #[must_use]
    pub const fn verbose(mut self, value: bool) -> Self {
        self.verbose = value;
        self
    }

    /// Returns a copy with zero values corrected to defaults.
    pub(crate) fn normalized(&self) -> Self {
        let defaults = Self::default();
        Self {
            chunk_size: if self.chunk_size == 0 {
                defaults.chunk_size
            } else {
                self.chunk_size
            },
            pull_workers: if self.pull_workers == 0 {
                defaults.pull_workers
            } else {
                self.pull_workers
            },
            verbose: self.verbose,
        }
    }
}

/// User-supplied callbacks wired into the engine at open time.
#[derive(Default)]
pub struct Hooks {
    /// Invoked once per chunk promotion with the chunk's aligned
    /// offset.
    pub on_chunk_is_local: Option<ChunkLocalHook>,

    /// Pull ordering heuristic. Defaults to a constant priority
    /// (any order).
    pub pull_priority: Option<PullPriority>,
}

impl Hooks {
    /// Creates empty hooks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the promotion notifier.
    #[must_use]
    pub fn on_chunk_is_local(mut self, hook: ChunkLocalHook) -> Self {
        self.on_chunk_is_local = Some(hook);
        self
    }

    /// Sets the pull ordering heuristic.
    #[must_use]
    pub fn pull_priority(mut self, priority: PullPriority) -> Self {
        self.pull_priority = Some(priority);
        self
    }
}
