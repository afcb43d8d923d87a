//! Worker pool for speculative thunk evaluation

use bitspec_core::{EvalConfig, EvalError, EvalResult};
use tracing::trace;

use crate::thunk::Thunk;

/// Runs sparked thunks ahead of demand.
///
/// With sparks disabled there is no pool and a sparked thunk behaves like
/// a delayed one.
pub struct SparkPool {
    pool: Option<rayon::ThreadPool>,
}

impl SparkPool {
    pub fn new(config: &EvalConfig) -> EvalResult<Self> {
        if !config.sparks_enabled {
            return Ok(Self { pool: None });
        }
        let mut builder =
            rayon::ThreadPoolBuilder::new().thread_name(|i| format!("bitspec-spark-{i}"));
        if let Some(threads) = config.spark_threads {
            builder = builder.num_threads(threads);
        }
        let pool = builder
            .build()
            .map_err(|e| EvalError::internal(format!("failed to create spark pool: {e}")))?;
        Ok(Self { pool: Some(pool) })
    }

    pub fn is_enabled(&self) -> bool {
        self.pool.is_some()
    }

    pub fn threads(&self) -> usize {
        self.pool.as_ref().map_or(0, rayon::ThreadPool::current_num_threads)
    }

    /// Start computing `thunk` on a worker unless a forcer claims it first
    pub fn submit<T>(&self, thunk: &Thunk<T>)
    where
        T: Clone + Send + Sync + 'static,
    {
        if let Some(pool) = &self.pool {
            trace!(thunk = thunk.name(), "sparked");
            let thunk = thunk.clone();
            pool.spawn(move || thunk.run_speculatively());
        }
    }
}

impl std::fmt::Debug for SparkPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SparkPool")
            .field("threads", &self.threads())
            .finish()
    }
}
