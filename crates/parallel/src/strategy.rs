//! Parallel processing strategies

use rayon::prelude::*;

/// Processing mode for batch execution.
///
/// Rows are CPU-bound (reprojection, rasterization) and carry no shared
/// mutable state, so data parallelism across worker threads scales with
/// cores. `ParallelWith` builds a scoped pool when the caller wants to
/// bound the worker count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingMode {
    /// Single-threaded processing
    Sequential,
    /// Parallel processing using all available cores
    #[default]
    Parallel,
    /// Parallel with specified number of threads
    ParallelWith(usize),
}

/// Strategy for parallel execution
pub trait ParallelStrategy {
    /// Map a function over indices and collect results in index order
    fn par_map<T, F>(&self, range: std::ops::Range<usize>, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send;
}

impl ParallelStrategy for ProcessingMode {
    fn par_map<T, F>(&self, range: std::ops::Range<usize>, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        match self {
            ProcessingMode::Sequential => range.map(f).collect(),
            ProcessingMode::Parallel => range.into_par_iter().map(f).collect(),
            ProcessingMode::ParallelWith(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(*threads)
                    .build()
                    .expect("Failed to build thread pool");
                pool.install(|| range.into_par_iter().map(f).collect())
            }
        }
    }
}

/// Get the number of available worker threads
pub fn num_workers() -> usize {
    rayon::current_num_threads()
}
