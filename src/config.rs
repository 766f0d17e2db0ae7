//! Runtime configuration shared by the coordinator and the worker.
use std::{num::NonZeroUsize, thread};

/// Segments at or below this length are sorted sequentially.
pub const DEFAULT_SEQUENTIAL_THRESHOLD: usize = 1000;

/// Tuning values injected into [`SortEngine`](crate::engine::SortEngine),
/// [`Coordinator`](crate::coordinator::Coordinator) and
/// [`WorkerServer`](crate::protocol::WorkerServer).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Number of threads available to the sort engine. Also bounds the
    /// fork depth to `log2(parallelism)`.
    pub parallelism: NonZeroUsize,
    /// Largest segment sorted without forking.
    pub sequential_threshold: usize,
}

impl Config {
    pub fn new(parallelism: NonZeroUsize, sequential_threshold: usize) -> Self {
        Self {
            parallelism,
            sequential_threshold,
        }
    }

    /// Override the parallelism; `None` keeps the current value.
    pub fn with_parallelism(mut self, parallelism: Option<NonZeroUsize>) -> Self {
        if let Some(parallelism) = parallelism {
            self.parallelism = parallelism;
        }
        self
    }

    /// Override the sequential threshold; `None` keeps the current value.
    pub fn with_sequential_threshold(mut self, threshold: Option<usize>) -> Self {
        if let Some(threshold) = threshold {
            self.sequential_threshold = threshold;
        }
        self
    }

    /// Depth below which the engine forks both halves of a split.
    pub fn max_fork_depth(&self) -> u32 {
        self.parallelism.get().ilog2()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            parallelism: thread::available_parallelism().unwrap_or(NonZeroUsize::MIN),
            sequential_threshold: DEFAULT_SEQUENTIAL_THRESHOLD,
        }
    }
}
