//! Parallel merge-sort engine.
//!
//! The engine sorts a segment by recursive halving, forking both halves onto
//! a dedicated rayon pool while the recursion depth is below
//! `log2(parallelism)` and continuing on the calling task beyond it. Small
//! segments fall back to a plain recursive merge sort.
//!
//! The same stable two-way [`merge`] drives [`SortEngine::merge_reduce`],
//! which combines already sorted segments in pairwise rounds. Every round is
//! a barrier: the next one starts only when all merges of the current round
//! have completed.
use log::{debug, trace};
use rayon::prelude::*;
use thiserror::Error;

use crate::{config::Config, sequence::Element};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to build sort thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub struct SortEngine {
    pool: rayon::ThreadPool,
    max_depth: u32,
    threshold: usize,
}

impl SortEngine {
    pub fn new(config: &Config) -> Result<Self, EngineError> {
        let threads = config.parallelism.get();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("sortnet-engine-{i}"))
            .build()?;
        debug!(
            "sort engine ready (threads: {threads}, fork depth: {}, threshold: {})",
            config.max_fork_depth(),
            config.sequential_threshold
        );

        Ok(Self {
            pool,
            max_depth: config.max_fork_depth(),
            threshold: config.sequential_threshold,
        })
    }

    /// Sort `segment` into a new ascending segment.
    pub fn sort(&self, segment: &[Element]) -> Vec<Element> {
        self.pool.install(|| self.sort_at(segment, 0))
    }

    fn sort_at(&self, segment: &[Element], depth: u32) -> Vec<Element> {
        if segment.len() <= 1 {
            return segment.to_vec();
        }
        if segment.len() <= self.threshold {
            return sequential_sort(segment);
        }

        let (left, right) = segment.split_at(segment.len() / 2);
        let (left, right) = if depth < self.max_depth {
            trace!("forking at depth {depth} ({} elements)", segment.len());
            rayon::join(
                || self.sort_at(left, depth + 1),
                || self.sort_at(right, depth + 1),
            )
        } else {
            (self.sort_at(left, depth + 1), self.sort_at(right, depth + 1))
        };

        merge(&left, &right)
    }

    /// Run a single merge-reduce round: adjacent pairs are merged
    /// concurrently and an odd trailing segment is carried over untouched.
    pub fn merge_round(&self, mut segments: Vec<Vec<Element>>) -> Vec<Vec<Element>> {
        let carry = if segments.len() % 2 == 1 {
            segments.pop()
        } else {
            None
        };

        let mut merged: Vec<Vec<Element>> = self.pool.install(|| {
            segments
                .par_chunks(2)
                .map(|pair| merge(&pair[0], &pair[1]))
                .collect()
        });
        merged.extend(carry);
        merged
    }

    /// Merge sorted segments, in order, into a single sorted segment.
    pub fn merge_reduce(&self, mut segments: Vec<Vec<Element>>) -> Vec<Element> {
        let mut round = 0;
        while segments.len() > 1 {
            round += 1;
            debug!("merge round {round}: {} segments", segments.len());
            segments = self.merge_round(segments);
        }

        segments.pop().unwrap_or_default()
    }
}

/// Stable merge of two ascending segments. On ties the element of `left`
/// comes first.
pub fn merge(left: &[Element], right: &[Element]) -> Vec<Element> {
    let mut out = Vec::with_capacity(left.len() + right.len());
    let (mut i, mut j) = (0, 0);

    while i < left.len() && j < right.len() {
        if left[i] <= right[j] {
            out.push(left[i]);
            i += 1;
        } else {
            out.push(right[j]);
            j += 1;
        }
    }
    out.extend_from_slice(&left[i..]);
    out.extend_from_slice(&right[j..]);
    out
}

/// Plain recursive merge sort.
pub fn sequential_sort(segment: &[Element]) -> Vec<Element> {
    if segment.len() <= 1 {
        return segment.to_vec();
    }

    let (left, right) = segment.split_at(segment.len() / 2);
    merge(&sequential_sort(left), &sequential_sort(right))
}
