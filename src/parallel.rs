//! Blocking fan-out/join over index ranges.
//!
//! Every batch in this crate has the same shape: one independent work item per
//! triangle or per point, each writing only its own output slot, and the
//! caller waits until all of them finish. [`Executor`] runs such batches on
//! rayon, either on the global pool or on a dedicated pool with a fixed number
//! of workers. Small batches (and sequential executors) run inline.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{Result, ShapeError};

/// Default number of items below which a batch runs on the calling thread.
pub const DEFAULT_MIN_PARALLEL_LEN: usize = 64;

/// Runs data-parallel batches and blocks until they complete.
#[derive(Debug)]
pub struct Executor {
    parallel: bool,
    min_len: usize,
    pool: Option<ThreadPool>,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new(true, DEFAULT_MIN_PARALLEL_LEN)
    }
}

impl Executor {
    /// Create an executor using the global rayon pool.
    ///
    /// Batches with fewer than `min_len` items run sequentially; `min_len` is
    /// also the smallest chunk handed to a worker.
    pub fn new(parallel: bool, min_len: usize) -> Self {
        Self {
            parallel,
            min_len: min_len.max(1),
            pool: None,
        }
    }

    /// Create a single-threaded executor.
    pub fn sequential() -> Self {
        Self::new(false, DEFAULT_MIN_PARALLEL_LEN)
    }

    /// Create an executor backed by a dedicated pool of `threads` workers.
    pub fn with_threads(threads: usize, min_len: usize) -> Result<Self> {
        if threads == 0 {
            return Err(ShapeError::invalid_param("threads", threads, "must be at least 1"));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("trimorph-worker-{}", i))
            .build()?;
        Ok(Self {
            parallel: true,
            min_len: min_len.max(1),
            pool: Some(pool),
        })
    }

    /// Whether batches may run on more than one thread.
    #[inline]
    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    /// Number of worker threads a parallel batch can use.
    pub fn num_threads(&self) -> usize {
        match (&self.pool, self.parallel) {
            (_, false) => 1,
            (Some(pool), true) => pool.current_num_threads(),
            (None, true) => rayon::current_num_threads(),
        }
    }

    #[inline]
    fn runs_parallel(&self, count: usize) -> bool {
        self.parallel && count >= self.min_len
    }

    fn install<R, OP>(&self, op: OP) -> R
    where
        R: Send,
        OP: FnOnce() -> R + Send,
    {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }

    /// Evaluate `f` for every index in `0..count`, keeping results in index order.
    pub fn map<T, F>(&self, count: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        if !self.runs_parallel(count) {
            return (0..count).map(f).collect();
        }
        let min_len = self.min_len;
        self.install(move || {
            (0..count)
                .into_par_iter()
                .with_min_len(min_len)
                .map(f)
                .collect()
        })
    }

    /// Like [`map`](Self::map), but fails the whole batch if any item fails.
    ///
    /// Every item runs to completion. On failure the error of the lowest
    /// failing index is returned, whatever the scheduling.
    pub fn try_map<T, F>(&self, count: usize, f: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(usize) -> Result<T> + Sync + Send,
    {
        self.map(count, f).into_iter().collect()
    }

    /// Consume `items`, running `f` on each.
    ///
    /// Used with disjoint mutable views so each item writes only its own slot.
    pub fn for_each<T, F>(&self, items: Vec<T>, f: F)
    where
        T: Send,
        F: Fn(T) + Sync + Send,
    {
        if !self.runs_parallel(items.len()) {
            items.into_iter().for_each(f);
            return;
        }
        let min_len = self.min_len;
        self.install(move || {
            items
                .into_par_iter()
                .with_min_len(min_len)
                .for_each(f)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_preserves_order() {
        let exec = Executor::new(true, 4);
        let squares = exec.map(1000, |i| i * i);
        assert_eq!(squares.len(), 1000);
        for (i, &v) in squares.iter().enumerate() {
            assert_eq!(v, i * i);
        }
    }

    #[test]
    fn test_sequential_matches_parallel() {
        let seq = Executor::sequential().map(257, |i| (i as f64).sqrt());
        let par = Executor::new(true, 1).map(257, |i| (i as f64).sqrt());
        assert_eq!(seq, par);
        assert_eq!(Executor::sequential().num_threads(), 1);
    }

    #[test]
    fn test_try_map_fails_whole_batch() {
        let exec = Executor::new(true, 8);
        let result = exec.try_map(100, |i| {
            if i == 42 {
                Err(ShapeError::DegenerateTriangle { triangle: i })
            } else {
                Ok(i)
            }
        });
        assert_eq!(result, Err(ShapeError::DegenerateTriangle { triangle: 42 }));

        let ok = exec.try_map(100, Ok).unwrap();
        assert_eq!(ok, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_try_map_reports_lowest_failure() {
        let failing = |i: usize| {
            if i % 7 == 3 {
                Err(ShapeError::DegenerateTriangle { triangle: i })
            } else {
                Ok(i)
            }
        };
        let expected = Err(ShapeError::DegenerateTriangle { triangle: 3 });

        assert_eq!(Executor::sequential().try_map(1000, failing), expected);
        for _ in 0..20 {
            assert_eq!(Executor::new(true, 1).try_map(1000, failing), expected);
        }
    }

    #[test]
    fn test_dedicated_pool() {
        let exec = Executor::with_threads(2, 1).unwrap();
        assert_eq!(exec.num_threads(), 2);

        let mut out = vec![0usize; 64];
        let slots: Vec<(usize, &mut usize)> = out.iter_mut().enumerate().collect();
        exec.for_each(slots, |(i, slot)| *slot = i + 1);
        assert!(out.iter().enumerate().all(|(i, &v)| v == i + 1));
    }

    #[test]
    fn test_zero_threads_rejected() {
        assert!(matches!(
            Executor::with_threads(0, 1),
            Err(ShapeError::InvalidParameter { name: "threads", .. })
        ));
    }
}
