//! Bounded worker pool for fan-out stages.

use rayon::prelude::*;

use crate::error::{PipelineError, PipelineResult};

/// A fixed-size rayon pool. Every [`fan_out`](Self::fan_out) call is a
/// barrier: it returns only once all of its tasks have finished.
pub struct WorkerPool {
    pool: rayon::ThreadPool,
}

impl WorkerPool {
    /// Build a pool with `threads` workers; `0` picks rayon's default (one
    /// per CPU).
    pub fn new(threads: usize) -> PipelineResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("prereq-worker-{i}"))
            .build()
            .map_err(|e| PipelineError::WorkerPool {
                threads,
                message: e.to_string(),
            })?;
        Ok(Self { pool })
    }

    /// Number of worker threads.
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `task` once per item on the pool. Each task returns its own
    /// result; nothing is shared between tasks. Results come back in item
    /// order regardless of completion order.
    pub fn fan_out<T, R, F>(&self, items: &[T], task: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        self.pool
            .install(|| items.par_iter().map(|item| task(item)).collect())
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.threads())
            .finish()
    }
}
