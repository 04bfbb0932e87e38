use crate::{CatalogueError, Result};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Worker pool configuration for per-table profiling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ThreadPoolConfig {
    /// Number of profiling workers (0 = auto-detect)
    pub workers: usize,
    /// Worker thread name prefix
    pub thread_prefix: String,
    /// Stack size for worker threads (bytes)
    pub stack_size: usize,
}

impl Default for ThreadPoolConfig {
    fn default() -> Self {
        Self {
            workers: 0, // Auto-detect
            thread_prefix: "catalogue-profiler".to_string(),
            stack_size: 8 * 1024 * 1024, // 8MB
        }
    }
}

impl ThreadPoolConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn effective_workers(&self) -> usize {
        if self.workers == 0 {
            num_cpus::get()
        } else {
            self.workers
        }
    }
}

/// Build a dedicated rayon pool. The pool is local to the run rather than
/// installed globally, so several engines can coexist in one process.
pub fn build_pool(config: &ThreadPoolConfig) -> Result<rayon::ThreadPool> {
    let num_threads = config.effective_workers();
    let thread_prefix = config.thread_prefix.clone();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .thread_name(move |idx| format!("{}-{}", thread_prefix, idx))
        .stack_size(config.stack_size)
        .panic_handler(|panic_info| {
            error!("Profiling worker panicked: {:?}", panic_info);
        })
        .build()
        .map_err(|e| CatalogueError::Configuration(format!("thread pool: {}", e)))?;

    info!(
        "Profiling pool configured: {} workers, {}MB stack size",
        num_threads,
        config.stack_size / (1024 * 1024)
    );

    Ok(pool)
}
