//! Buffer pool configuration.

use oxbow_common::constants::{DEFAULT_IO_WORKERS, DEFAULT_POOL_SIZE, DEFAULT_REPLACER_K};

/// Configuration for the buffer pool.
#[derive(Debug, Clone)]
pub struct BufferPoolConfig {
    /// Number of page frames in the buffer pool.
    pub pool_size: usize,
    /// K for the LRU-K replacement policy.
    pub replacer_k: usize,
    /// Number of disk scheduler worker threads.
    pub io_workers: usize,
}

impl BufferPoolConfig {
    /// Creates a configuration with the given number of frames and default
    /// policy and scheduler settings.
    pub fn new(pool_size: usize) -> Self {
        Self {
            pool_size,
            replacer_k: DEFAULT_REPLACER_K,
            io_workers: DEFAULT_IO_WORKERS,
        }
    }

    /// Sets the replacement policy's K.
    pub fn with_replacer_k(mut self, replacer_k: usize) -> Self {
        self.replacer_k = replacer_k;
        self
    }

    /// Sets the number of disk scheduler workers.
    pub fn with_io_workers(mut self, io_workers: usize) -> Self {
        self.io_workers = io_workers;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.pool_size == 0 {
            return Err("pool_size must be > 0");
        }
        if self.replacer_k == 0 {
            return Err("replacer_k must be > 0");
        }
        if self.io_workers == 0 {
            return Err("io_workers must be > 0");
        }
        Ok(())
    }
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_SIZE)
    }
}
