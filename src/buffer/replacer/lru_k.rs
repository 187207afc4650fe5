//! LRU-K replacement policy.

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;
use tracing::trace;

use crate::common::{Error, FrameId, Result};

/// LRU-K eviction policy.
///
/// Each tracked frame sits in exactly one of two recency-ordered lists:
///
/// ```text
///   history (< K accesses)         cache (>= K accesses)
///   newest ... oldest  ──evict──▶  newest ... oldest  ──evict──▶
/// ```
///
/// A frame enters `history` on its first access and is promoted to `cache`
/// on its K-th access. Further accesses move it to the front of `cache`.
/// Accesses between the first and the K-th leave its history position
/// untouched, so `history` is ordered by first access.
///
/// Victims come from the back of `history` first: a frame that has not yet
/// been touched K times has an infinite backward K-distance. Only when no
/// evictable frame is left there is the back of `cache` used.
///
/// All methods take `&self`; the lists live behind an internal mutex that is
/// independent of the buffer pool's latch.
pub struct LruKReplacer {
    capacity: usize,
    k: usize,
    inner: Mutex<LruKState>,
}

struct LruKState {
    entries: HashMap<FrameId, LruKEntry>,
    /// stamp -> frame, frames with fewer than K accesses.
    history: BTreeMap<u64, FrameId>,
    /// stamp -> frame, frames with K or more accesses.
    cache: BTreeMap<u64, FrameId>,
    clock: u64,
    evictable: usize,
}

struct LruKEntry {
    hits: usize,
    stamp: u64,
    evictable: bool,
}

impl LruKEntry {
    fn in_cache(&self, k: usize) -> bool {
        self.hits >= k
    }
}

impl LruKState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn detach(&mut self, frame_id: FrameId, k: usize) -> Option<LruKEntry> {
        let entry = self.entries.remove(&frame_id)?;
        if entry.in_cache(k) {
            self.cache.remove(&entry.stamp);
        } else {
            self.history.remove(&entry.stamp);
        }
        if entry.evictable {
            self.evictable -= 1;
        }
        Some(entry)
    }
}

impl LruKReplacer {
    /// Create a replacer for frames `0..capacity`.
    ///
    /// # Errors
    /// `Error::InvalidConfig` if `capacity` or `k` is zero.
    pub fn new(capacity: usize, k: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidConfig("replacer capacity must be > 0".into()));
        }
        if k == 0 {
            return Err(Error::InvalidConfig("replacer k must be > 0".into()));
        }

        Ok(Self {
            capacity,
            k,
            inner: Mutex::new(LruKState {
                entries: HashMap::with_capacity(capacity),
                history: BTreeMap::new(),
                cache: BTreeMap::new(),
                clock: 0,
                evictable: 0,
            }),
        })
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Record an access to `frame_id`.
    ///
    /// A frame seen for the first time starts out non-evictable.
    pub fn record_access(&self, frame_id: FrameId) -> Result<()> {
        self.check(frame_id)?;
        let k = self.k;
        let mut state = self.inner.lock();
        let stamp = state.tick();

        let Some(entry) = state.entries.get_mut(&frame_id) else {
            state.entries.insert(
                frame_id,
                LruKEntry {
                    hits: 1,
                    stamp,
                    evictable: false,
                },
            );
            if k == 1 {
                state.cache.insert(stamp, frame_id);
            } else {
                state.history.insert(stamp, frame_id);
            }
            return Ok(());
        };

        let was_cached = entry.in_cache(k);
        entry.hits = entry.hits.saturating_add(1);
        if !entry.in_cache(k) {
            return Ok(());
        }

        let old_stamp = std::mem::replace(&mut entry.stamp, stamp);
        if was_cached {
            state.cache.remove(&old_stamp);
        } else {
            state.history.remove(&old_stamp);
        }
        state.cache.insert(stamp, frame_id);
        Ok(())
    }

    /// Mark a frame as a victim candidate or not.
    ///
    /// Unknown frames are ignored.
    pub fn set_evictable(&self, frame_id: FrameId, evictable: bool) -> Result<()> {
        self.check(frame_id)?;
        let mut state = self.inner.lock();

        let Some(entry) = state.entries.get_mut(&frame_id) else {
            return Ok(());
        };
        if entry.evictable == evictable {
            return Ok(());
        }
        entry.evictable = evictable;
        if evictable {
            state.evictable += 1;
        } else {
            state.evictable -= 1;
        }
        Ok(())
    }

    /// Pick a victim, drop its tracking, and return it.
    ///
    /// Returns `None` when no tracked frame is evictable.
    pub fn evict(&self) -> Option<FrameId> {
        let mut state = self.inner.lock();
        if state.evictable == 0 {
            return None;
        }

        let victim = {
            let evictable = |frame_id: &FrameId| {
                state
                    .entries
                    .get(frame_id)
                    .is_some_and(|entry| entry.evictable)
            };
            state
                .history
                .values()
                .find(|f| evictable(f))
                .or_else(|| state.cache.values().find(|f| evictable(f)))
                .copied()
        }?;

        let entry = state.detach(victim, self.k)?;
        trace!(frame = %victim, hits = entry.hits, "lru-k victim");
        Some(victim)
    }

    /// Drop all tracking for a frame.
    ///
    /// Untracked frames are ignored.
    ///
    /// # Errors
    /// `Error::FrameNotEvictable` if the frame is tracked but still pinned.
    pub fn remove(&self, frame_id: FrameId) -> Result<()> {
        self.check(frame_id)?;
        let mut state = self.inner.lock();

        match state.entries.get(&frame_id) {
            None => Ok(()),
            Some(entry) if !entry.evictable => Err(Error::FrameNotEvictable(frame_id.0)),
            Some(_) => {
                state.detach(frame_id, self.k);
                Ok(())
            }
        }
    }

    /// Number of evictable frames.
    pub fn size(&self) -> usize {
        self.inner.lock().evictable
    }

    fn check(&self, frame_id: FrameId) -> Result<()> {
        if frame_id.0 >= self.capacity {
            return Err(Error::InvalidFrameId(frame_id.0));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f(id: usize) -> FrameId {
        FrameId::new(id)
    }

    fn touch(replacer: &LruKReplacer, frames: &[usize]) {
        for &id in frames {
            replacer.record_access(f(id)).unwrap();
        }
    }

    fn unpin_all(replacer: &LruKReplacer, frames: &[usize]) {
        for &id in frames {
            replacer.set_evictable(f(id), true).unwrap();
        }
    }

    #[test]
    fn test_rejects_bad_config() {
        assert!(LruKReplacer::new(0, 2).is_err());
        assert!(LruKReplacer::new(4, 0).is_err());
    }

    #[test]
    fn test_new_frames_are_not_evictable() {
        let replacer = LruKReplacer::new(4, 2).unwrap();
        touch(&replacer, &[0, 1]);
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_history_evicted_before_cache() {
        // A, B, A with K=2: A has K accesses, B has fewer. B goes first
        // even though B was touched after A's first access.
        let replacer = LruKReplacer::new(2, 2).unwrap();
        touch(&replacer, &[0, 1, 0]);
        unpin_all(&replacer, &[0, 1]);

        assert_eq!(replacer.evict(), Some(f(1)));
        assert_eq!(replacer.evict(), Some(f(0)));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_history_is_fifo_by_first_access() {
        let replacer = LruKReplacer::new(8, 3).unwrap();
        touch(&replacer, &[1, 2, 3, 1, 2]);
        unpin_all(&replacer, &[1, 2, 3]);

        assert_eq!(replacer.evict(), Some(f(1)));
        assert_eq!(replacer.evict(), Some(f(2)));
        assert_eq!(replacer.evict(), Some(f(3)));
    }

    #[test]
    fn test_cache_is_lru() {
        let replacer = LruKReplacer::new(8, 2).unwrap();
        touch(&replacer, &[1, 1, 2, 2, 3, 3]);
        touch(&replacer, &[1]);
        unpin_all(&replacer, &[1, 2, 3]);

        assert_eq!(replacer.evict(), Some(f(2)));
        assert_eq!(replacer.evict(), Some(f(3)));
        assert_eq!(replacer.evict(), Some(f(1)));
    }

    #[test]
    fn test_pinned_frames_are_skipped() {
        let replacer = LruKReplacer::new(8, 2).unwrap();
        touch(&replacer, &[1, 2, 3]);
        unpin_all(&replacer, &[1, 2, 3]);
        replacer.set_evictable(f(1), false).unwrap();
        assert_eq!(replacer.size(), 2);

        assert_eq!(replacer.evict(), Some(f(2)));
        replacer.set_evictable(f(1), true).unwrap();
        assert_eq!(replacer.evict(), Some(f(1)));
        assert_eq!(replacer.evict(), Some(f(3)));
        assert_eq!(replacer.size(), 0);
    }

    #[test]
    fn test_k_equals_one_is_plain_lru() {
        let replacer = LruKReplacer::new(4, 1).unwrap();
        touch(&replacer, &[0, 1, 2, 0]);
        unpin_all(&replacer, &[0, 1, 2]);

        assert_eq!(replacer.evict(), Some(f(1)));
        assert_eq!(replacer.evict(), Some(f(2)));
        assert_eq!(replacer.evict(), Some(f(0)));
    }

    #[test]
    fn test_evicted_frame_starts_fresh() {
        let replacer = LruKReplacer::new(4, 2).unwrap();
        touch(&replacer, &[0, 0, 1]);
        unpin_all(&replacer, &[0, 1]);
        assert_eq!(replacer.evict(), Some(f(1)));

        // Frame 1 is reused: one access puts it back in history.
        touch(&replacer, &[1]);
        replacer.set_evictable(f(1), true).unwrap();
        assert_eq!(replacer.evict(), Some(f(1)));
    }

    #[test]
    fn test_set_evictable_is_idempotent() {
        let replacer = LruKReplacer::new(4, 2).unwrap();
        touch(&replacer, &[0]);
        replacer.set_evictable(f(0), true).unwrap();
        replacer.set_evictable(f(0), true).unwrap();
        assert_eq!(replacer.size(), 1);

        // Unknown frame: no-op.
        replacer.set_evictable(f(3), true).unwrap();
        assert_eq!(replacer.size(), 1);
    }

    #[test]
    fn test_remove() {
        let replacer = LruKReplacer::new(4, 2).unwrap();
        touch(&replacer, &[0, 1]);

        assert!(matches!(
            replacer.remove(f(0)),
            Err(Error::FrameNotEvictable(0))
        ));

        replacer.set_evictable(f(0), true).unwrap();
        replacer.remove(f(0)).unwrap();
        assert_eq!(replacer.size(), 0);

        // Untracked: no-op.
        replacer.remove(f(2)).unwrap();

        replacer.set_evictable(f(1), true).unwrap();
        assert_eq!(replacer.evict(), Some(f(1)));
    }

    #[test]
    fn test_out_of_range_frame() {
        let replacer = LruKReplacer::new(4, 2).unwrap();
        assert!(matches!(
            replacer.record_access(f(4)),
            Err(Error::InvalidFrameId(4))
        ));
        assert!(replacer.set_evictable(f(9), true).is_err());
        assert!(replacer.remove(f(9)).is_err());
    }

    #[test]
    fn test_bustub_sample() {
        let replacer = LruKReplacer::new(7, 2).unwrap();

        // Six frames, frame 6 stays pinned.
        touch(&replacer, &[1, 2, 3, 4, 5, 6]);
        unpin_all(&replacer, &[1, 2, 3, 4, 5]);
        assert_eq!(replacer.size(), 5);

        // Frame 1 now has two accesses; the rest have one.
        touch(&replacer, &[1]);

        assert_eq!(replacer.evict(), Some(f(2)));
        assert_eq!(replacer.evict(), Some(f(3)));
        assert_eq!(replacer.evict(), Some(f(4)));
        assert_eq!(replacer.size(), 2);

        touch(&replacer, &[3, 4, 5, 4]);
        unpin_all(&replacer, &[3, 4]);
        assert_eq!(replacer.size(), 4);

        // Frame 3 has one access and is oldest in history.
        assert_eq!(replacer.evict(), Some(f(3)));
        assert_eq!(replacer.size(), 3);

        replacer.set_evictable(f(6), true).unwrap();
        assert_eq!(replacer.size(), 4);
        assert_eq!(replacer.evict(), Some(f(6)));
        assert_eq!(replacer.size(), 3);

        replacer.set_evictable(f(1), false).unwrap();
        assert_eq!(replacer.size(), 2);
        assert_eq!(replacer.evict(), Some(f(5)));
        assert_eq!(replacer.size(), 1);

        touch(&replacer, &[1, 1]);
        replacer.set_evictable(f(1), true).unwrap();
        assert_eq!(replacer.size(), 2);
        assert_eq!(replacer.evict(), Some(f(4)));
        assert_eq!(replacer.size(), 1);
        assert_eq!(replacer.evict(), Some(f(1)));
        assert_eq!(replacer.size(), 0);

        assert_eq!(replacer.evict(), None);
    }
}
