//! Buffer pool manager.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use oxbow_common::types::{AccessType, PageId};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use super::config::BufferPoolConfig;
use super::frame::{BufferFrame, FrameId};
use super::guard::{BasicPageGuard, ReadPageGuard, WritePageGuard};
use super::replacer::LruKReplacer;
use super::BufferPoolStats;
use crate::disk::{DiskGateway, DiskScheduler, IoError, IoResult};

/// Bookkeeping protected by the pool latch.
struct PoolState {
    /// Maps resident page ids to the frame hosting them.
    page_table: HashMap<PageId, FrameId>,
    /// Frames currently hosting no page.
    free_list: VecDeque<FrameId>,
    /// Next page id to hand out. Monotone; ids are never reused.
    next_page_id: u64,
}

/// The buffer pool manager.
///
/// Owns a fixed array of page frames and upholds the pool invariant: every
/// in-use page is resident in exactly one frame, dirty data is written back
/// before its frame is reused, and pinned frames are never evicted.
///
/// Page faults are serviced through the [`DiskScheduler`]; victims come
/// from the [`LruKReplacer`]. All operations are serialized under one pool
/// latch, which is held across disk waits — that keeps concurrent faults
/// on the same absent page single-flight at the cost of serializing I/O.
///
/// Recoverable conditions (no frame available, page not resident, pin
/// underflow, delete while pinned) are reported as `None`/`false`; disk
/// errors are logged and mapped to the same "no frame" outcome.
pub struct BufferPoolManager {
    /// The frame array, allocated once at construction.
    frames: Vec<Arc<BufferFrame>>,
    /// Page table, free list, and the page id allocator.
    state: Mutex<PoolState>,
    /// Replacement policy.
    replacer: LruKReplacer,
    /// Worker pool executing page reads and writes.
    scheduler: DiskScheduler,
    fetch_count: AtomicU64,
    hit_count: AtomicU64,
    miss_count: AtomicU64,
    eviction_count: AtomicU64,
    flush_count: AtomicU64,
}

impl BufferPoolManager {
    /// Creates a pool with `config.pool_size` frames over `gateway`.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid.
    pub fn new(config: BufferPoolConfig, gateway: Arc<dyn DiskGateway>) -> Self {
        config.validate().expect("invalid buffer pool configuration");

        let frames = (0..config.pool_size)
            .map(|i| Arc::new(BufferFrame::new(FrameId::new(i))))
            .collect();
        // Initially every frame is free.
        let free_list = (0..config.pool_size).map(FrameId::new).collect();

        Self {
            frames,
            state: Mutex::new(PoolState {
                page_table: HashMap::with_capacity(config.pool_size),
                free_list,
                next_page_id: 0,
            }),
            replacer: LruKReplacer::new(config.pool_size, config.replacer_k),
            scheduler: DiskScheduler::new(gateway, config.io_workers),
            fetch_count: AtomicU64::new(0),
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
            eviction_count: AtomicU64::new(0),
            flush_count: AtomicU64::new(0),
        }
    }

    /// Number of frames in the pool.
    pub fn size(&self) -> usize {
        self.frames.len()
    }

    /// Allocates a fresh page id and a zeroed, pinned frame for it.
    ///
    /// Returns `None` when no frame can be obtained: the free list is empty
    /// and every resident page is pinned (or the eviction write-back
    /// failed).
    pub fn new_page(&self) -> Option<(PageId, Arc<BufferFrame>)> {
        let mut state = self.state.lock();
        let frame_id = self.acquire_frame(&mut state, AccessType::Unknown)?;

        let page_id = PageId::new(state.next_page_id);
        state.next_page_id += 1;

        let frame = &self.frames[frame_id.index()];
        frame.set_page_id(page_id);
        frame.pin();
        self.replacer.set_evictable(frame_id, false);
        state.page_table.insert(page_id, frame_id);

        trace!(%page_id, %frame_id, "allocated new page");
        Some((page_id, Arc::clone(frame)))
    }

    /// Returns the frame hosting `page_id`, pinning it; faults the page in
    /// from disk if it is not resident.
    ///
    /// Returns `None` when no frame can be obtained or the disk read fails.
    pub fn fetch_page(&self, page_id: PageId, access_type: AccessType) -> Option<Arc<BufferFrame>> {
        if !page_id.is_valid() {
            return None;
        }
        let mut state = self.state.lock();
        self.fetch_count.fetch_add(1, Ordering::Relaxed);

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
            let frame = &self.frames[frame_id.index()];
            frame.pin();
            self.replacer.record_access(frame_id, access_type);
            self.replacer.set_evictable(frame_id, false);
            return Some(Arc::clone(frame));
        }

        self.miss_count.fetch_add(1, Ordering::Relaxed);
        let frame_id = self.acquire_frame(&mut state, access_type)?;
        let frame = &self.frames[frame_id.index()];
        frame.set_page_id(page_id);

        // The latch is held across the wait; nobody can race this fault.
        let promise = self.scheduler.schedule_read(Arc::clone(frame.buf()), page_id);
        if let Err(error) = Self::await_io(promise) {
            warn!(%page_id, %error, "page read failed; undoing frame allocation");
            frame.reset();
            self.replacer.set_evictable(frame_id, true);
            self.replacer.remove(frame_id);
            state.free_list.push_back(frame_id);
            return None;
        }

        frame.pin();
        state.page_table.insert(page_id, frame_id);
        trace!(%page_id, %frame_id, "page faulted in");
        Some(Arc::clone(frame))
    }

    /// Releases one pin on `page_id` and ORs `is_dirty` into its dirty
    /// flag.
    ///
    /// Returns false if the page is not resident or its pin count is
    /// already zero. When the last pin goes away the frame becomes
    /// evictable.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let state = self.state.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return false;
        };
        let frame = &self.frames[frame_id.index()];
        if frame.pin_count() == 0 {
            return false;
        }
        if frame.unpin() == 0 {
            self.replacer.set_evictable(frame_id, true);
        }
        frame.or_dirty(is_dirty);
        true
    }

    /// Writes `page_id`'s bytes out through the scheduler and clears the
    /// dirty flag, whether or not it was set.
    ///
    /// Returns false if the page is not resident (or the id is the invalid
    /// sentinel), or if the write fails — in which case the dirty flag is
    /// left alone.
    pub fn flush_page(&self, page_id: PageId) -> bool {
        if !page_id.is_valid() {
            return false;
        }
        let state = self.state.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return false;
        };
        let frame = &self.frames[frame_id.index()];

        let promise = self.scheduler.schedule_write(Arc::clone(frame.buf()), page_id);
        match Self::await_io(promise) {
            Ok(()) => {
                frame.set_dirty(false);
                self.flush_count.fetch_add(1, Ordering::Relaxed);
                debug!(%page_id, "page flushed");
                true
            }
            Err(error) => {
                warn!(%page_id, %error, "page flush failed");
                false
            }
        }
    }

    /// Flushes every currently resident page.
    ///
    /// The resident set is snapshotted first; each page is then flushed
    /// through [`flush_page`](Self::flush_page), re-taking the latch per
    /// page. Pages deleted in between are skipped.
    pub fn flush_all_pages(&self) {
        let resident: Vec<PageId> = self.state.lock().page_table.keys().copied().collect();
        for page_id in resident {
            self.flush_page(page_id);
        }
    }

    /// Drops `page_id` from the pool, returning its frame to the free
    /// list. The page's bytes are discarded, not written back.
    ///
    /// Returns true if the page is not resident (vacuously deleted) or was
    /// deleted; false if it is pinned.
    pub fn delete_page(&self, page_id: PageId) -> bool {
        let mut state = self.state.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return true;
        };
        let frame = &self.frames[frame_id.index()];
        if frame.is_pinned() {
            return false;
        }

        state.page_table.remove(&page_id);
        self.replacer.remove(frame_id);
        state.free_list.push_back(frame_id);
        frame.reset();

        trace!(%page_id, %frame_id, "page deleted");
        true
    }

    /// Fetches `page_id` behind a pin-only guard.
    pub fn fetch_page_basic(&self, page_id: PageId) -> Option<BasicPageGuard<'_>> {
        let frame = self.fetch_page(page_id, AccessType::Unknown)?;
        Some(BasicPageGuard::new(self, frame))
    }

    /// Fetches `page_id` behind a read-locked guard.
    pub fn fetch_page_read(&self, page_id: PageId) -> Option<ReadPageGuard<'_>> {
        let frame = self.fetch_page(page_id, AccessType::Unknown)?;
        Some(ReadPageGuard::new(self, frame))
    }

    /// Fetches `page_id` behind a write-locked guard.
    pub fn fetch_page_write(&self, page_id: PageId) -> Option<WritePageGuard<'_>> {
        let frame = self.fetch_page(page_id, AccessType::Unknown)?;
        Some(WritePageGuard::new(self, frame))
    }

    /// Allocates a new page behind a pin-only guard.
    pub fn new_page_guarded(&self) -> Option<BasicPageGuard<'_>> {
        let (_page_id, frame) = self.new_page()?;
        Some(BasicPageGuard::new(self, frame))
    }

    /// Returns a snapshot of pool counters.
    pub fn stats(&self) -> BufferPoolStats {
        let mut pinned = 0;
        let mut dirty = 0;
        for frame in &self.frames {
            if frame.is_pinned() {
                pinned += 1;
            }
            if frame.is_dirty() {
                dirty += 1;
            }
        }
        let free = self.state.lock().free_list.len();

        BufferPoolStats {
            fetches: self.fetch_count.load(Ordering::Relaxed),
            hits: self.hit_count.load(Ordering::Relaxed),
            misses: self.miss_count.load(Ordering::Relaxed),
            evictions: self.eviction_count.load(Ordering::Relaxed),
            flushes: self.flush_count.load(Ordering::Relaxed),
            pinned_frames: pinned,
            dirty_frames: dirty,
            free_frames: free,
        }
    }

    // -------------------------------------------------------------------------
    // Private helpers
    // -------------------------------------------------------------------------

    /// Picks a frame for a page about to become resident: the free list's
    /// front if any, otherwise an evicted victim (written back first when
    /// dirty). The frame comes back reset, with its first access recorded
    /// and non-evictable.
    ///
    /// Returns `None` when no victim exists or the write-back failed; a
    /// failed write-back leaves the victim resident and dirty so no data
    /// is lost.
    fn acquire_frame(&self, state: &mut PoolState, access_type: AccessType) -> Option<FrameId> {
        let frame_id = match state.free_list.pop_front() {
            Some(frame_id) => frame_id,
            None => {
                let victim = self.replacer.evict()?;
                let frame = &self.frames[victim.index()];
                let old_page = frame.page_id();

                if frame.is_dirty() {
                    let promise = self
                        .scheduler
                        .schedule_write(Arc::clone(frame.buf()), old_page);
                    if let Err(error) = Self::await_io(promise) {
                        warn!(%old_page, %error, "eviction write-back failed; keeping page resident");
                        // The victim is already out of the replacer; put it
                        // back with a fresh history rather than lose track
                        // of an evictable frame.
                        self.replacer.record_access(victim, access_type);
                        self.replacer.set_evictable(victim, true);
                        return None;
                    }
                }

                state.page_table.remove(&old_page);
                self.eviction_count.fetch_add(1, Ordering::Relaxed);
                trace!(%old_page, frame_id = %victim, "page evicted");
                victim
            }
        };

        let frame = &self.frames[frame_id.index()];
        frame.reset();
        self.replacer.record_access(frame_id, access_type);
        Some(frame_id)
    }

    /// Blocks on a scheduler promise. A promise dropped without resolving
    /// counts as a failed request.
    fn await_io(promise: oneshot::Receiver<IoResult<()>>) -> IoResult<()> {
        promise
            .blocking_recv()
            .unwrap_or(Err(IoError::Canceled))
    }
}

impl std::fmt::Debug for BufferPoolManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPoolManager")
            .field("pool_size", &self.frames.len())
            .field("resident", &self.state.lock().page_table.len())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::MemoryDisk;
    use oxbow_common::constants::PAGE_SIZE;

    fn create_test_pool(pool_size: usize) -> (BufferPoolManager, Arc<MemoryDisk>) {
        let disk = Arc::new(MemoryDisk::new());
        let config = BufferPoolConfig::new(pool_size).with_io_workers(2);
        (
            BufferPoolManager::new(config, Arc::clone(&disk) as Arc<dyn DiskGateway>),
            disk,
        )
    }

    #[test]
    fn test_new_page_ids_are_monotone() {
        let (pool, _disk) = create_test_pool(4);
        let (id0, _) = pool.new_page().unwrap();
        let (id1, _) = pool.new_page().unwrap();
        assert_eq!(id0, PageId::new(0));
        assert_eq!(id1, PageId::new(1));
    }

    #[test]
    fn test_new_page_is_zeroed_and_pinned() {
        let (pool, _disk) = create_test_pool(4);
        let (_, frame) = pool.new_page().unwrap();
        assert_eq!(frame.pin_count(), 1);
        assert!(!frame.is_dirty());
        assert!(frame.read_data().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_pool_exhaustion() {
        let (pool, _disk) = create_test_pool(2);
        let _a = pool.new_page().unwrap();
        let _b = pool.new_page().unwrap();
        // Both frames pinned: nothing to evict.
        assert!(pool.new_page().is_none());
    }

    #[test]
    fn test_fetch_resident_page_is_a_hit() {
        let (pool, disk) = create_test_pool(4);
        let (page_id, frame) = pool.new_page().unwrap();

        let again = pool.fetch_page(page_id, AccessType::Lookup).unwrap();
        assert_eq!(again.frame_id(), frame.frame_id());
        assert_eq!(again.pin_count(), 2);
        // Resident hit: the disk saw no traffic.
        assert_eq!(disk.read_count(), 0);

        let stats = pool.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 0);
    }

    #[test]
    fn test_fetch_invalid_id() {
        let (pool, _disk) = create_test_pool(4);
        assert!(pool.fetch_page(PageId::INVALID, AccessType::Unknown).is_none());
    }

    #[test]
    fn test_unpin_unknown_or_unpinned() {
        let (pool, _disk) = create_test_pool(4);
        assert!(!pool.unpin_page(PageId::new(99), false));

        let (page_id, _) = pool.new_page().unwrap();
        assert!(pool.unpin_page(page_id, false));
        // Pin count is already zero.
        assert!(!pool.unpin_page(page_id, false));
    }

    #[test]
    fn test_unpin_dirty_never_downgrades() {
        let (pool, disk) = create_test_pool(2);
        let (page_id, frame) = pool.new_page().unwrap();
        frame.write_data()[0] = 1;

        pool.fetch_page(page_id, AccessType::Unknown).unwrap();
        assert!(pool.unpin_page(page_id, true));
        // A later clean unpin must not clear the dirty bit.
        assert!(pool.unpin_page(page_id, false));

        // Force the eviction; the write must happen.
        pool.new_page().unwrap();
        pool.new_page().unwrap();
        assert_eq!(disk.write_count(), 1);
    }

    #[test]
    fn test_flush_clears_dirty_and_writes() {
        let (pool, disk) = create_test_pool(4);
        let (page_id, frame) = pool.new_page().unwrap();
        frame.write_data()[0] = 0xee;
        pool.unpin_page(page_id, true);

        assert!(pool.flush_page(page_id));
        assert!(!frame.is_dirty());
        assert_eq!(disk.write_count(), 1);
        assert_eq!(disk.page(page_id).unwrap()[0], 0xee);

        // Flushing a clean page still writes and still returns true.
        assert!(pool.flush_page(page_id));
        assert_eq!(disk.write_count(), 2);
    }

    #[test]
    fn test_flush_non_resident() {
        let (pool, _disk) = create_test_pool(4);
        assert!(!pool.flush_page(PageId::new(12)));
        assert!(!pool.flush_page(PageId::INVALID));
    }

    #[test]
    fn test_flush_all_pages() {
        let (pool, disk) = create_test_pool(4);
        for _ in 0..3 {
            let (page_id, _) = pool.new_page().unwrap();
            pool.unpin_page(page_id, true);
        }
        pool.flush_all_pages();
        assert_eq!(disk.write_count(), 3);
        assert_eq!(pool.stats().dirty_frames, 0);
    }

    #[test]
    fn test_delete_page() {
        let (pool, _disk) = create_test_pool(4);
        let (page_id, _) = pool.new_page().unwrap();

        // Pinned: refused.
        assert!(!pool.delete_page(page_id));

        pool.unpin_page(page_id, false);
        assert!(pool.delete_page(page_id));

        // Non-resident: vacuous.
        assert!(pool.delete_page(page_id));
        assert!(pool.delete_page(PageId::new(1234)));

        let stats = pool.stats();
        assert_eq!(stats.free_frames, 4);
    }

    #[test]
    fn test_deleted_dirty_page_is_not_written_back() {
        let (pool, disk) = create_test_pool(4);
        let (page_id, frame) = pool.new_page().unwrap();
        frame.write_data()[0] = 9;
        pool.unpin_page(page_id, true);

        assert!(pool.delete_page(page_id));
        assert_eq!(disk.write_count(), 0);
    }

    #[test]
    fn test_eviction_round_trip_through_disk() {
        let (pool, disk) = create_test_pool(1);
        let (page_id, frame) = pool.new_page().unwrap();
        frame.write_data()[0..4].copy_from_slice(&[1, 2, 3, 4]);
        pool.unpin_page(page_id, true);

        // Take over the only frame: the dirty page is written out.
        let (other_id, _) = pool.new_page().unwrap();
        assert_eq!(disk.write_count(), 1);
        pool.unpin_page(other_id, false);

        // Fault the original page back in and check its bytes survived.
        let frame = pool.fetch_page(page_id, AccessType::Unknown).unwrap();
        assert_eq!(&frame.read_data()[0..4], &[1, 2, 3, 4]);
        assert_eq!(disk.read_count(), 1);
    }

    #[test]
    fn test_failed_read_undoes_frame_allocation() {
        let (pool, disk) = create_test_pool(2);
        disk.set_faulted(true);

        assert!(pool.fetch_page(PageId::new(5), AccessType::Unknown).is_none());

        // The frame went back to the free list and nothing became resident.
        let stats = pool.stats();
        assert_eq!(stats.free_frames, 2);
        disk.set_faulted(false);
        assert!(pool.fetch_page(PageId::new(5), AccessType::Unknown).is_some());
    }

    #[test]
    fn test_failed_eviction_write_keeps_page_resident() {
        let (pool, disk) = create_test_pool(1);
        let (page_id, frame) = pool.new_page().unwrap();
        frame.write_data()[0] = 0x42;
        pool.unpin_page(page_id, true);

        disk.set_faulted(true);
        // Eviction write-back fails: no frame, page stays resident+dirty.
        assert!(pool.new_page().is_none());
        let frame = pool.fetch_page(page_id, AccessType::Unknown).unwrap();
        assert!(frame.is_dirty());
        assert_eq!(frame.read_data()[0], 0x42);
        pool.unpin_page(page_id, false);

        disk.set_faulted(false);
        assert!(pool.new_page().is_some());
        assert_eq!(disk.write_count(), 1);
    }

    #[test]
    fn test_free_list_and_page_table_partition_frames() {
        let (pool, _disk) = create_test_pool(3);
        let mut ids = Vec::new();
        for _ in 0..3 {
            let (page_id, _) = pool.new_page().unwrap();
            pool.unpin_page(page_id, false);
            ids.push(page_id);
        }
        let stats = pool.stats();
        assert_eq!(stats.free_frames, 0);

        pool.delete_page(ids[1]);
        let stats = pool.stats();
        assert_eq!(stats.free_frames, 1);

        // Every frame is either free or hosts exactly one resident page.
        assert_eq!(pool.size(), 3);
    }

    #[test]
    fn test_pinned_pages_are_never_evicted() {
        let (pool, disk) = create_test_pool(2);
        let (keep_id, _keep) = pool.new_page().unwrap();
        let (evict_id, _) = pool.new_page().unwrap();
        pool.unpin_page(evict_id, false);

        // Only the unpinned page can make room for the third.
        pool.new_page().unwrap();
        assert!(pool.fetch_page(keep_id, AccessType::Unknown).is_some());
        // A hit, not a fault: the pinned page was never evicted.
        assert_eq!(disk.read_count(), 0);
    }

    #[test]
    fn test_page_data_survives_write_read_cycle() {
        let (pool, _disk) = create_test_pool(2);
        let (page_id, frame) = pool.new_page().unwrap();
        {
            let mut data = frame.write_data();
            for (i, b) in data.iter_mut().enumerate().take(PAGE_SIZE) {
                *b = (i % 251) as u8;
            }
        }
        pool.unpin_page(page_id, true);
        pool.flush_page(page_id);
        pool.delete_page(page_id);

        let frame = pool.fetch_page(page_id, AccessType::Unknown).unwrap();
        let data = frame.read_data();
        for (i, b) in data.iter().enumerate() {
            assert_eq!(*b, (i % 251) as u8);
        }
    }
}
