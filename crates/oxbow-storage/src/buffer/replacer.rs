//! LRU-K page replacement policy.
//!
//! LRU-K evicts the frame whose *backward K-distance* is largest: the time
//! elapsed since its K-th most recent access. A frame with fewer than K
//! recorded accesses has infinite K-distance and is preferred for eviction;
//! ties among such frames fall back to classical LRU on their oldest
//! recorded access. Compared to plain LRU this resists scan pollution: one
//! touch does not make a page look hot.

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use oxbow_common::types::AccessType;
use parking_lot::Mutex;

use super::frame::FrameId;

/// Per-frame access bookkeeping.
struct LruKNode {
    /// Up to K access timestamps in nanoseconds, newest first.
    history: VecDeque<u64>,
    /// Whether the pool currently allows this frame to be evicted.
    evictable: bool,
}

struct LruKState {
    nodes: HashMap<FrameId, LruKNode>,
    /// Number of nodes currently marked evictable.
    evictable_count: usize,
    /// Timestamp of the most recent recorded access.
    last_timestamp: u64,
}

impl LruKState {
    /// Next strictly-increasing timestamp off the monotonic clock.
    ///
    /// Bumped by one whenever two calls land in the same nanosecond, so
    /// access histories stay totally ordered.
    fn next_timestamp(&mut self, origin: Instant) -> u64 {
        let now = origin.elapsed().as_nanos() as u64;
        self.last_timestamp = now.max(self.last_timestamp + 1);
        self.last_timestamp
    }
}

/// Tracks per-frame access history and picks eviction victims.
///
/// All operations are serialized under one internal mutex. The replacer
/// only *selects* victims; the buffer pool is responsible for keeping
/// pinned frames marked non-evictable.
pub struct LruKReplacer {
    state: Mutex<LruKState>,
    origin: Instant,
    capacity: usize,
    k: usize,
}

impl LruKReplacer {
    /// Creates a replacer for `capacity` frames with policy parameter `k`.
    ///
    /// # Panics
    ///
    /// Panics if `k` is zero.
    pub fn new(capacity: usize, k: usize) -> Self {
        assert!(k > 0, "LRU-K needs k >= 1");
        Self {
            state: Mutex::new(LruKState {
                nodes: HashMap::with_capacity(capacity),
                evictable_count: 0,
                last_timestamp: 0,
            }),
            origin: Instant::now(),
            capacity,
            k,
        }
    }

    /// Records an access to `frame_id` at the current timestamp.
    ///
    /// An unknown frame is registered with this single access and starts
    /// non-evictable. The access-type hint is reserved for scan-resistant
    /// policies and ignored by the baseline.
    pub fn record_access(&self, frame_id: FrameId, _access_type: AccessType) {
        let mut state = self.state.lock();
        let timestamp = state.next_timestamp(self.origin);

        match state.nodes.get_mut(&frame_id) {
            Some(node) => {
                node.history.push_front(timestamp);
                if node.history.len() > self.k {
                    node.history.pop_back();
                }
            }
            None => {
                let mut history = VecDeque::with_capacity(self.k);
                history.push_front(timestamp);
                state.nodes.insert(
                    frame_id,
                    LruKNode {
                        history,
                        evictable: false,
                    },
                );
            }
        }
    }

    /// Marks `frame_id` evictable or not. Idempotent when the flag already
    /// matches.
    ///
    /// # Panics
    ///
    /// Panics if the frame is unknown, or if enabling would push the
    /// evictable count past the configured capacity.
    pub fn set_evictable(&self, frame_id: FrameId, evictable: bool) {
        let mut state = self.state.lock();
        let node = state
            .nodes
            .get_mut(&frame_id)
            .unwrap_or_else(|| panic!("set_evictable on unknown frame {frame_id}"));

        if node.evictable == evictable {
            return;
        }
        node.evictable = evictable;
        if evictable {
            state.evictable_count += 1;
            assert!(
                state.evictable_count <= self.capacity,
                "evictable count exceeds replacer capacity {}",
                self.capacity
            );
        } else {
            state.evictable_count -= 1;
        }
    }

    /// Removes `frame_id` and its history. Unknown frames are a no-op.
    ///
    /// # Panics
    ///
    /// Panics if the frame exists but is not evictable.
    pub fn remove(&self, frame_id: FrameId) {
        let mut state = self.state.lock();
        let Some(node) = state.nodes.get(&frame_id) else {
            return;
        };
        assert!(
            node.evictable,
            "remove of non-evictable frame {frame_id}"
        );
        state.nodes.remove(&frame_id);
        state.evictable_count -= 1;
    }

    /// Picks, removes, and returns the frame with the largest backward
    /// K-distance among evictable frames; `None` when nothing is evictable.
    pub fn evict(&self) -> Option<FrameId> {
        let mut state = self.state.lock();

        // The frame with the largest K-distance is the one whose K-th most
        // recent access is earliest. For a short history the same slot holds
        // the oldest recorded access, which is exactly the LRU tie-break for
        // the infinite-distance class, so one ordering key covers both:
        // (has a full K-history, earliest relevant timestamp).
        let victim = state
            .nodes
            .iter()
            .filter(|(_, node)| node.evictable)
            .map(|(&frame_id, node)| {
                let full = node.history.len() >= self.k;
                let stamp = *node.history.back().expect("node with empty history");
                (full, stamp, frame_id)
            })
            .min_by_key(|&(full, stamp, frame_id)| (full, stamp, frame_id.index()))?
            .2;

        state.nodes.remove(&victim);
        state.evictable_count -= 1;
        Some(victim)
    }

    /// Number of frames currently evictable.
    pub fn size(&self) -> usize {
        self.state.lock().evictable_count
    }
}

impl std::fmt::Debug for LruKReplacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LruKReplacer")
            .field("capacity", &self.capacity)
            .field("k", &self.k)
            .field("evictable", &self.size())
            .finish()
    }
}
