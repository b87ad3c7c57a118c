//! Page guards - scoped, pinned access to a page.
//!
//! A guard bundles a pinned frame with an access intent. Construction
//! acquires the pin (and, for read/write guards, the frame's data lock);
//! dropping the guard releases the lock and unpins the page, forwarding
//! the dirty bit implied by the intent. Guards are move-only.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use oxbow_common::types::PageId;
use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::RawRwLock;

use super::frame::BufferFrame;
use super::pool::BufferPoolManager;

/// Pinned access to a page without holding its data lock.
///
/// Byte access goes through [`data`](BasicPageGuard::data) and
/// [`data_mut`](BasicPageGuard::data_mut), which take the frame lock for
/// the duration of the borrow. Mutable access marks the guard dirty, as
/// does an explicit [`mark_dirty`](BasicPageGuard::mark_dirty); the dirty
/// bit is forwarded to the pool when the guard drops.
pub struct BasicPageGuard<'a> {
    pool: &'a BufferPoolManager,
    frame: Option<Arc<BufferFrame>>,
    dirty: bool,
}

impl<'a> BasicPageGuard<'a> {
    pub(super) fn new(pool: &'a BufferPoolManager, frame: Arc<BufferFrame>) -> Self {
        Self {
            pool,
            frame: Some(frame),
            dirty: false,
        }
    }

    /// Returns the guarded page's id.
    pub fn page_id(&self) -> PageId {
        self.frame().page_id()
    }

    /// Borrows the page bytes read-only.
    pub fn data(&self) -> impl Deref<Target = [u8]> + '_ {
        PageDataRef {
            guard: self.frame().read_data(),
        }
    }

    /// Borrows the page bytes mutably, marking the guard dirty.
    pub fn data_mut(&mut self) -> impl DerefMut<Target = [u8]> + '_ {
        self.dirty = true;
        PageDataMut {
            guard: self.frame().write_data(),
        }
    }

    /// Marks the page dirty without touching the bytes.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    fn frame(&self) -> &BufferFrame {
        self.frame.as_ref().expect("page guard used after release")
    }
}

impl Drop for BasicPageGuard<'_> {
    fn drop(&mut self) {
        if let Some(frame) = self.frame.take() {
            self.pool.unpin_page(frame.page_id(), self.dirty);
        }
    }
}

struct PageDataRef<'a> {
    guard: parking_lot::RwLockReadGuard<'a, Box<[u8]>>,
}

impl Deref for PageDataRef<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

struct PageDataMut<'a> {
    guard: parking_lot::RwLockWriteGuard<'a, Box<[u8]>>,
}

impl Deref for PageDataMut<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl DerefMut for PageDataMut<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}

/// Pinned, read-locked access to a page.
///
/// Holds the frame's data lock in shared mode for its whole lifetime, so
/// the bytes cannot change (and no write-back can run) underneath it. Drop
/// releases the lock, then unpins clean.
pub struct ReadPageGuard<'a> {
    pool: &'a BufferPoolManager,
    frame: Option<Arc<BufferFrame>>,
    lock: Option<ArcRwLockReadGuard<RawRwLock, Box<[u8]>>>,
}

impl<'a> ReadPageGuard<'a> {
    pub(super) fn new(pool: &'a BufferPoolManager, frame: Arc<BufferFrame>) -> Self {
        let lock = frame.buf().read_arc();
        Self {
            pool,
            frame: Some(frame),
            lock: Some(lock),
        }
    }

    /// Returns the guarded page's id.
    pub fn page_id(&self) -> PageId {
        self.frame
            .as_ref()
            .expect("page guard used after release")
            .page_id()
    }

    /// Returns the page bytes.
    pub fn data(&self) -> &[u8] {
        self.lock.as_ref().expect("page guard used after release")
    }
}

impl Drop for ReadPageGuard<'_> {
    fn drop(&mut self) {
        // Release the data lock before handing the pin back.
        drop(self.lock.take());
        if let Some(frame) = self.frame.take() {
            self.pool.unpin_page(frame.page_id(), false);
        }
    }
}

/// Pinned, write-locked access to a page.
///
/// Holds the frame's data lock exclusively; drop releases the lock, then
/// unpins dirty (a write intent always marks the page modified).
pub struct WritePageGuard<'a> {
    pool: &'a BufferPoolManager,
    frame: Option<Arc<BufferFrame>>,
    lock: Option<ArcRwLockWriteGuard<RawRwLock, Box<[u8]>>>,
}

impl<'a> WritePageGuard<'a> {
    pub(super) fn new(pool: &'a BufferPoolManager, frame: Arc<BufferFrame>) -> Self {
        let lock = frame.buf().write_arc();
        Self {
            pool,
            frame: Some(frame),
            lock: Some(lock),
        }
    }

    /// Returns the guarded page's id.
    pub fn page_id(&self) -> PageId {
        self.frame
            .as_ref()
            .expect("page guard used after release")
            .page_id()
    }

    /// Returns the page bytes.
    pub fn data(&self) -> &[u8] {
        self.lock.as_ref().expect("page guard used after release")
    }

    /// Returns the page bytes mutably.
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.lock.as_mut().expect("page guard used after release")
    }
}

impl Drop for WritePageGuard<'_> {
    fn drop(&mut self) {
        drop(self.lock.take());
        if let Some(frame) = self.frame.take() {
            self.pool.unpin_page(frame.page_id(), true);
        }
    }
}
