//! Disk gateway and asynchronous I/O scheduling.
//!
//! This module provides:
//!
//! - [`DiskGateway`]: the synchronous read/write-one-page seam the rest of
//!   the engine is built over, with a file-backed implementation
//!   ([`FileDisk`]) and an in-memory implementation for tests
//!   ([`MemoryDisk`])
//! - [`DiskScheduler`]: a fixed pool of worker threads that executes
//!   [`DiskRequest`]s against the gateway and resolves a one-shot
//!   completion promise per request
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐  schedule()   ┌──────────────────────────┐
//! │  callers   │ ────────────▶ │  request queue (MPMC)    │
//! └────────────┘               └──────────────────────────┘
//!       ▲                         │          │
//!       │ completion promise      ▼          ▼
//!       │                   ┌─────────┐ ┌─────────┐
//!       └────────────────── │ worker 0│…│ worker N│
//!                           └─────────┘ └─────────┘
//!                                │          │
//!                                ▼          ▼
//!                           DiskGateway::read_page / write_page
//! ```

mod error;
mod gateway;
mod scheduler;

pub use error::{IoError, IoResult};
pub use gateway::{DiskGateway, FileDisk, MemoryDisk};
pub use scheduler::{DiskOp, DiskRequest, DiskScheduler, PageBuf};
