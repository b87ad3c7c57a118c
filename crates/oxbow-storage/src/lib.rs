//! # oxbow-storage
//!
//! The storage-engine substrate of OxbowDB: the buffer pool manager, its
//! LRU-K page-replacement policy, and the asynchronous disk I/O scheduler
//! the pool dispatches through.
//!
//! The buffer pool owns a fixed array of page frames and upholds one global
//! invariant: every page the system accesses occupies exactly one frame,
//! dirty data reaches disk before its frame is reused, and pinned frames
//! are never evicted.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use oxbow_storage::buffer::{BufferPoolConfig, BufferPoolManager};
//! use oxbow_storage::disk::MemoryDisk;
//!
//! let pool = BufferPoolManager::new(BufferPoolConfig::new(16), Arc::new(MemoryDisk::new()));
//!
//! let (page_id, _frame) = pool.new_page().unwrap();
//! assert!(pool.unpin_page(page_id, false));
//! assert!(pool.flush_page(page_id));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod buffer;
pub mod disk;
