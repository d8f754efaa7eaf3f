use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use crate::common::{FrameId, Timestamp};

/// The kind of access being recorded. Policies may weight scans differently
/// from point lookups; the current policy treats them all the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessType {
    #[default]
    Unknown,
    Lookup,
    Scan,
    Index,
}

/// Per-frame access history.
///
/// A frame with fewer than k recorded accesses has infinite backward
/// k-distance and lives in the fifo class; on its k-th access it is promoted
/// to the lru class.
#[derive(Debug)]
struct LruKNode {
    /// Access timestamps, most recent at the back, at most k entries
    history: VecDeque<Timestamp>,
    /// Whether this frame may currently be evicted
    is_evictable: bool,
    /// Whether the frame has reached k accesses
    is_lru: bool,
}

#[derive(Default)]
struct ReplacerState {
    /// Access info for every tracked frame
    node_store: HashMap<FrameId, LruKNode>,
    /// Frames with fewer than k accesses, in insertion order
    fifo: VecDeque<FrameId>,
    /// Frames with k or more accesses, least recently accessed at the front
    lru: VecDeque<FrameId>,
    /// Monotonically increasing logical clock
    current_timestamp: Timestamp,
    /// Number of currently evictable frames
    num_evictable: usize,
}

/// LRU-K replacement policy.
///
/// Eviction prefers frames whose k-th most recent access is furthest in the
/// past. Frames with fewer than k accesses count as infinitely distant and go
/// first, tie-broken by insertion order; among fully-observed frames the least
/// recently accessed goes first. Both classes skip frames that are not marked
/// evictable.
pub struct LruKReplacer {
    /// K value for the LRU-K algorithm
    k: usize,
    /// Maximum number of frames the replacer can track
    capacity: usize,
    /// All mutable state, usable standalone or under the pool mutex
    state: Mutex<ReplacerState>,
}

impl LruKReplacer {
    /// Creates a new LRU-K replacer tracking at most `capacity` frames.
    pub fn new(k: usize, capacity: usize) -> Self {
        assert!(k > 0, "k must be at least 1");
        Self {
            k,
            capacity,
            state: Mutex::new(ReplacerState::default()),
        }
    }

    /// Records an access to the given frame, inserting it into the fifo class
    /// if it is not yet tracked and promoting it to the lru class on its k-th
    /// access.
    pub fn record_access(&self, frame_id: FrameId, _access_type: AccessType) {
        assert!(
            frame_id.as_usize() < self.capacity,
            "frame id {} out of range for replacer of capacity {}",
            frame_id,
            self.capacity
        );

        let mut state = self.state.lock();
        let timestamp = state.current_timestamp;
        state.current_timestamp += 1;

        if !state.node_store.contains_key(&frame_id) {
            let mut history = VecDeque::with_capacity(self.k);
            history.push_back(timestamp);
            let is_lru = self.k == 1;
            state.node_store.insert(
                frame_id,
                LruKNode {
                    history,
                    is_evictable: false,
                    is_lru,
                },
            );
            if is_lru {
                state.lru.push_back(frame_id);
            } else {
                state.fifo.push_back(frame_id);
            }
            return;
        }

        let (was_lru, now_lru) = {
            let node = state.node_store.get_mut(&frame_id).unwrap();
            let was_lru = node.is_lru;
            node.history.push_back(timestamp);
            while node.history.len() > self.k {
                node.history.pop_front();
            }
            if !node.is_lru && node.history.len() >= self.k {
                node.is_lru = true;
            }
            (was_lru, node.is_lru)
        };

        if was_lru {
            // Refresh recency ordering
            if let Some(pos) = state.lru.iter().position(|&f| f == frame_id) {
                state.lru.remove(pos);
            }
            state.lru.push_back(frame_id);
        } else if now_lru {
            // k-th access: leave the fifo class
            if let Some(pos) = state.fifo.iter().position(|&f| f == frame_id) {
                state.fifo.remove(pos);
            }
            state.lru.push_back(frame_id);
        }
    }

    /// Evicts the frame with the largest backward k-distance: the first
    /// evictable frame in the fifo class, else the least recently accessed
    /// evictable frame in the lru class. Returns None if nothing is evictable.
    pub fn evict(&self) -> Option<FrameId> {
        let mut state = self.state.lock();

        if state.num_evictable == 0 {
            return None;
        }

        let victim = state
            .fifo
            .iter()
            .copied()
            .find(|f| state.node_store[f].is_evictable)
            .or_else(|| {
                state
                    .lru
                    .iter()
                    .copied()
                    .find(|f| state.node_store[f].is_evictable)
            })?;

        Self::detach(&mut state, victim);
        Some(victim)
    }

    /// Sets whether a frame may be evicted. A frame becomes evictable when its
    /// pin count drops to zero and non-evictable whenever it is pinned.
    /// Unknown frame ids are ignored.
    pub fn set_evictable(&self, frame_id: FrameId, evictable: bool) {
        assert!(
            frame_id.as_usize() < self.capacity,
            "frame id {} out of range for replacer of capacity {}",
            frame_id,
            self.capacity
        );

        let mut state = self.state.lock();
        let changed = match state.node_store.get_mut(&frame_id) {
            Some(node) if node.is_evictable != evictable => {
                node.is_evictable = evictable;
                true
            }
            _ => false,
        };
        if changed {
            if evictable {
                state.num_evictable += 1;
            } else {
                state.num_evictable -= 1;
            }
        }
    }

    /// Forgets a frame entirely. Called when its page is deleted from the
    /// pool. Unknown frames are a silent no-op; removing a frame that is
    /// still pinned is a caller bug.
    pub fn remove(&self, frame_id: FrameId) {
        let mut state = self.state.lock();

        if !state.node_store.contains_key(&frame_id) {
            return;
        }
        assert!(
            state.node_store[&frame_id].is_evictable,
            "cannot remove non-evictable frame {}",
            frame_id
        );

        Self::detach(&mut state, frame_id);
    }

    /// Returns the number of evictable frames.
    pub fn size(&self) -> usize {
        self.state.lock().num_evictable
    }

    /// Returns the k value of this replacer.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Drops a tracked frame from its class list and the node store.
    fn detach(state: &mut ReplacerState, frame_id: FrameId) {
        let node = state.node_store.remove(&frame_id).unwrap();
        if node.is_lru {
            if let Some(pos) = state.lru.iter().position(|&f| f == frame_id) {
                state.lru.remove(pos);
            }
        } else if let Some(pos) = state.fifo.iter().position(|&f| f == frame_id) {
            state.fifo.remove(pos);
        }
        if node.is_evictable {
            state.num_evictable -= 1;
        }
    }
}
