//! Shape configuration.

use crate::error::{Result, ShapeError};
use crate::parallel::{Executor, DEFAULT_MIN_PARALLEL_LEN};

/// Options for a [`TriangulatedShape`](super::TriangulatedShape).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeOptions {
    /// Whether to use parallel execution (default: true).
    pub parallel: bool,

    /// Size of a dedicated worker pool. `None` uses the global rayon pool.
    pub threads: Option<usize>,

    /// Whether weight tables are cached per target id (default: true).
    pub weights_cache: bool,

    /// Batches smaller than this run on the calling thread; also the minimum
    /// number of items per worker chunk.
    pub min_parallel_len: usize,
}

impl Default for ShapeOptions {
    fn default() -> Self {
        Self {
            parallel: true,
            threads: None,
            weights_cache: true,
            min_parallel_len: DEFAULT_MIN_PARALLEL_LEN,
        }
    }
}

impl ShapeOptions {
    /// Set whether to use parallel execution.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Create options for single-threaded execution.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Run batches on a dedicated pool of `threads` workers.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Set whether weight tables are cached.
    pub fn with_weights_cache(mut self, enabled: bool) -> Self {
        self.weights_cache = enabled;
        self
    }

    /// Set the minimum batch length for parallel execution.
    pub fn with_min_parallel_len(mut self, len: usize) -> Self {
        self.min_parallel_len = len;
        self
    }

    /// Check the option values.
    pub fn validate(&self) -> Result<()> {
        if self.min_parallel_len == 0 {
            return Err(ShapeError::invalid_param(
                "min_parallel_len",
                self.min_parallel_len,
                "must be at least 1",
            ));
        }
        if self.threads == Some(0) {
            return Err(ShapeError::invalid_param("threads", 0, "must be at least 1"));
        }
        Ok(())
    }

    pub(crate) fn build_executor(&self) -> Result<Executor> {
        self.validate()?;
        match (self.parallel, self.threads) {
            (true, Some(threads)) => Executor::with_threads(threads, self.min_parallel_len),
            (parallel, _) => Ok(Executor::new(parallel, self.min_parallel_len)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ShapeOptions::default();
        assert!(options.parallel);
        assert!(options.weights_cache);
        assert_eq!(options.threads, None);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_builders() {
        let options = ShapeOptions::default()
            .sequential()
            .with_weights_cache(false)
            .with_min_parallel_len(8);
        assert!(!options.parallel);
        assert!(!options.weights_cache);
        assert_eq!(options.min_parallel_len, 8);

        let exec = options.build_executor().unwrap();
        assert!(!exec.is_parallel());
    }

    #[test]
    fn test_dedicated_pool() {
        let exec = ShapeOptions::default()
            .with_threads(3)
            .build_executor()
            .unwrap();
        assert_eq!(exec.num_threads(), 3);
    }

    #[test]
    fn test_invalid() {
        assert!(ShapeOptions::default().with_threads(0).validate().is_err());
        assert!(ShapeOptions::default()
            .with_min_parallel_len(0)
            .validate()
            .is_err());
    }
}
