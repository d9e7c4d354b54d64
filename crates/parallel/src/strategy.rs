//! Parallel processing strategies

use std::fmt;

use rayon::{ThreadPool, ThreadPoolBuilder};
use terrargb_core::{Error, Result};

/// Processing mode for the encoding pipeline
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

impl ProcessingMode {
    /// Worker pool for this mode, `None` when sequential.
    pub fn thread_pool(&self) -> Result<Option<ThreadPool>> {
        let builder = match self {
            ProcessingMode::Sequential => return Ok(None),
            ProcessingMode::Parallel => ThreadPoolBuilder::new(),
            ProcessingMode::ParallelWith(0) => {
                return Err(Error::InvalidParameter {
                    name: "threads",
                    value: "0".into(),
                    reason: "at least one worker thread is required".into(),
                })
            }
            ProcessingMode::ParallelWith(threads) => ThreadPoolBuilder::new().num_threads(*threads),
        };
        builder
            .thread_name(|i| format!("terrargb-worker-{}", i))
            .build()
            .map(Some)
            .map_err(|e| Error::Other(format!("Failed to build thread pool: {}", e)))
    }

    /// Number of worker threads this mode runs with
    pub fn threads(&self) -> usize {
        match self {
            ProcessingMode::Sequential => 1,
            ProcessingMode::Parallel => num_cpus(),
            ProcessingMode::ParallelWith(threads) => *threads,
        }
    }
}

impl fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessingMode::Sequential => write!(f, "sequential"),
            mode => write!(f, "parallel ({} threads)", mode.threads()),
        }
    }
}

/// Get the number of available CPU cores
pub fn num_cpus() -> usize {
    rayon::current_num_threads()
}
