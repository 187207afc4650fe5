//! Buffer Pool Manager - the core page caching layer.
//!
//! The [`BufferPoolManager`] provides:
//! - Page caching between disk and memory
//! - Pin-based reference counting
//! - Write-back of dirty pages on eviction, flush and delete
//! - LRU-K victim selection

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use tracing::{debug, error, trace};

use crate::buffer::replacer::LruKReplacer;
use crate::buffer::{BufferPoolStats, Frame, PageGuard, PageReadGuard, PageWriteGuard};
use crate::common::config::{DEFAULT_POOL_SIZE, DEFAULT_REPLACER_K};
use crate::common::{Error, FrameId, PageId, Result};
use crate::storage::DiskManager;

/// Manages a pool of buffer frames for caching disk pages.
///
/// # Architecture
/// ```text
/// ┌─────────────────────────────────────────────────────────────┐
/// │                    BufferPoolManager                        │
/// │  ┌─────────── state: Mutex ───────────┐                     │
/// │  │ page_table: PageId → FrameId       │  frames: Vec<Frame> │
/// │  │ free_list:  Vec<FrameId>           │─▶ [F0] [F1] [F2] …  │
/// │  └────────────────────────────────────┘                     │
/// │  ┌──────────────┐  ┌───────────────────┐                    │
/// │  │ LruKReplacer │  │ Mutex<DiskManager>│                    │
/// │  └──────────────┘  └───────────────────┘                    │
/// └─────────────────────────────────────────────────────────────┘
/// ```
///
/// # Thread Safety
/// - `state`: one mutex serializes every public operation's bookkeeping:
///   page table, free list, pin counts and replacer updates.
/// - `replacer`: has its own internal mutex, always taken inside `state`.
/// - `disk_manager`: taken inside `state`, or alone while holding a page
///   latch during a flush.
/// - `frames`: each frame's page latch is taken only after `state` has been
///   released, except for unpinned frames, which nobody else can latch.
///
/// A guard releases its latch before it unpins, so a frame with pin count
/// zero never has a latch holder and eviction never waits on one.
pub struct BufferPoolManager {
    frames: Vec<Frame>,
    state: Mutex<PoolState>,
    replacer: LruKReplacer,
    disk_manager: Mutex<DiskManager>,
    stats: BufferPoolStats,
    pool_size: usize,
}

struct PoolState {
    /// Resident pages. An entry exists iff the page is loaded in that frame.
    page_table: HashMap<PageId, FrameId>,
    /// Frames holding no page (LIFO).
    free_list: Vec<FrameId>,
    /// Resident pages to delete once their last pin is dropped.
    pending_deletes: HashSet<PageId>,
}

impl BufferPoolManager {
    /// Create a buffer pool with `pool_size` frames and an LRU-`replacer_k`
    /// eviction policy.
    ///
    /// # Errors
    /// `Error::InvalidConfig` if `pool_size` or `replacer_k` is 0.
    pub fn new(pool_size: usize, replacer_k: usize, disk_manager: DiskManager) -> Result<Self> {
        let replacer = LruKReplacer::new(pool_size, replacer_k)?;

        let frames: Vec<Frame> = (0..pool_size).map(|_| Frame::new()).collect();
        // Reversed so frame 0 is handed out first.
        let free_list: Vec<FrameId> = (0..pool_size).rev().map(FrameId::new).collect();

        Ok(Self {
            frames,
            state: Mutex::new(PoolState {
                page_table: HashMap::with_capacity(pool_size),
                free_list,
                pending_deletes: HashSet::new(),
            }),
            replacer,
            disk_manager: Mutex::new(disk_manager),
            stats: BufferPoolStats::new(),
            pool_size,
        })
    }

    /// Buffer pool with [`DEFAULT_POOL_SIZE`] frames and LRU-[`DEFAULT_REPLACER_K`].
    pub fn with_defaults(disk_manager: DiskManager) -> Result<Self> {
        Self::new(DEFAULT_POOL_SIZE, DEFAULT_REPLACER_K, disk_manager)
    }

    // ========================================================================
    // Public API: Fetch pages
    // ========================================================================

    /// Fetch a page for reading (shared latch).
    ///
    /// # Errors
    /// - `Error::PageNotFound` if the page doesn't exist on disk
    /// - `Error::NoFreeFrames` if all frames are pinned
    pub fn fetch_page_read(&self, page_id: PageId) -> Result<PageReadGuard<'_>> {
        let frame_id = self.pin_page(page_id)?;
        let lock = self.frames[frame_id.0].page();

        Ok(PageReadGuard::new(self, frame_id, page_id, lock))
    }

    /// Fetch a page for writing (exclusive latch).
    ///
    /// The page is marked dirty when the guard is released.
    ///
    /// # Errors
    /// - `Error::PageNotFound` if the page doesn't exist on disk
    /// - `Error::NoFreeFrames` if all frames are pinned
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<PageWriteGuard<'_>> {
        let frame_id = self.pin_page(page_id)?;
        let lock = self.frames[frame_id.0].page_mut();

        Ok(PageWriteGuard::new(self, frame_id, page_id, lock))
    }

    /// Fetch a page and pin it without latching.
    pub fn fetch_page_basic(&self, page_id: PageId) -> Result<PageGuard<'_>> {
        let frame_id = self.pin_page(page_id)?;
        Ok(PageGuard::new(self, frame_id, page_id))
    }

    /// Like [`fetch_page_read`](Self::fetch_page_read), `None` on any failure.
    pub fn checked_read_page(&self, page_id: PageId) -> Option<PageReadGuard<'_>> {
        self.fetch_page_read(page_id).ok()
    }

    /// Like [`fetch_page_write`](Self::fetch_page_write), `None` on any failure.
    pub fn checked_write_page(&self, page_id: PageId) -> Option<PageWriteGuard<'_>> {
        self.fetch_page_write(page_id).ok()
    }

    // ========================================================================
    // Public API: Create and delete pages
    // ========================================================================

    /// Allocate a new zeroed page and load it, pinned, into the pool.
    ///
    /// # Errors
    /// - `Error::NoFreeFrames` if all frames are pinned
    /// - I/O errors from disk allocation
    pub fn new_page(&self) -> Result<PageWriteGuard<'_>> {
        let (frame_id, page_id) = {
            let mut state = self.state.lock();
            let frame_id = self.acquire_frame(&mut state)?;

            let allocated = self.disk_manager.lock().allocate_page();
            let page_id = match allocated {
                Ok(page_id) => page_id,
                Err(err) => {
                    state.free_list.push(frame_id);
                    return Err(err);
                }
            };

            self.frames[frame_id.0].page_mut().reset();
            self.install(&mut state, frame_id, page_id)?;
            (frame_id, page_id)
        };

        trace!(%page_id, frame = %frame_id, "new page");
        let lock = self.frames[frame_id.0].page_mut();
        Ok(PageWriteGuard::new(self, frame_id, page_id, lock))
    }

    /// Allocate a page id on disk without loading it into the pool.
    pub fn allocate_page_id(&self) -> Result<PageId> {
        let _state = self.state.lock();
        self.disk_manager.lock().allocate_page()
    }

    /// Drop a page from the pool and release its slot on disk.
    ///
    /// A page that is not resident is left alone and reported as success.
    ///
    /// # Errors
    /// `Error::PagePinned` if the page still has holders.
    pub fn delete_page(&self, page_id: PageId) -> Result<()> {
        let mut state = self.state.lock();

        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return Ok(());
        };
        if self.frames[frame_id.0].is_pinned() {
            return Err(Error::PagePinned(page_id.0));
        }
        self.discard(&mut state, frame_id, page_id)
    }

    /// Delete a page as soon as nobody holds it.
    ///
    /// An unpinned page is deleted right away. A pinned one is marked and
    /// deleted by the [`unpin_page`](Self::unpin_page) that drops its last
    /// pin. A page that is no longer resident only has its disk slot
    /// released. Returns `true` if the page is gone by the time this returns.
    pub fn delete_page_when_unpinned(&self, page_id: PageId) -> Result<bool> {
        if !page_id.is_valid() {
            return Err(Error::InvalidPageId(page_id.0));
        }
        let mut state = self.state.lock();

        let Some(&frame_id) = state.page_table.get(&page_id) else {
            self.disk_manager.lock().deallocate_page(page_id)?;
            self.stats.record_delete();
            debug!(%page_id, "released slot of evicted page");
            return Ok(true);
        };
        if self.frames[frame_id.0].is_pinned() {
            state.pending_deletes.insert(page_id);
            debug!(%page_id, frame = %frame_id, "page delete deferred until unpinned");
            return Ok(false);
        }
        self.discard(&mut state, frame_id, page_id)?;
        Ok(true)
    }

    /// Number of pinned pages waiting for their last unpin to be deleted.
    pub fn pending_delete_count(&self) -> usize {
        self.state.lock().pending_deletes.len()
    }

    // ========================================================================
    // Public API: Pin bookkeeping
    // ========================================================================

    /// Drop one pin on a resident page, marking it dirty if requested.
    ///
    /// The dirty flag is sticky: only a write-back clears it. When the pin
    /// count reaches zero the frame becomes an eviction candidate.
    ///
    /// # Errors
    /// - `Error::PageNotResident` if the page is not in the pool
    /// - `Error::PageNotPinned` if its pin count is already zero
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<()> {
        let mut state = self.state.lock();

        let &frame_id = state
            .page_table
            .get(&page_id)
            .ok_or(Error::PageNotResident(page_id.0))?;
        let frame = &self.frames[frame_id.0];

        if !frame.is_pinned() {
            return Err(Error::PageNotPinned(page_id.0));
        }
        if is_dirty {
            frame.mark_dirty();
        }

        match frame.unpin() {
            Some(0) => {
                self.replacer.set_evictable(frame_id, true)?;
                if state.pending_deletes.contains(&page_id) {
                    self.discard(&mut state, frame_id, page_id)?;
                }
                Ok(())
            }
            Some(_) => Ok(()),
            None => Err(Error::PageNotPinned(page_id.0)),
        }
    }

    /// Pin count of a resident page, `None` if it is not resident.
    pub fn get_pin_count(&self, page_id: PageId) -> Option<u32> {
        let state = self.state.lock();
        state
            .page_table
            .get(&page_id)
            .map(|fid| self.frames[fid.0].pin_count())
    }

    pub fn contains_page(&self, page_id: PageId) -> bool {
        self.state.lock().page_table.contains_key(&page_id)
    }

    // ========================================================================
    // Public API: Flush pages
    // ========================================================================

    /// Write a resident page to disk and clear its dirty flag.
    ///
    /// Returns `false` if the page is not resident or is the invalid id.
    /// Must not be called while holding a write latch on the same page.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        if !page_id.is_valid() {
            return Ok(false);
        }

        // Pin so the frame stays put once the pool mutex is released.
        let frame_id = {
            let state = self.state.lock();
            let Some(&frame_id) = state.page_table.get(&page_id) else {
                return Ok(false);
            };
            self.frames[frame_id.0].pin();
            self.replacer.set_evictable(frame_id, false)?;
            frame_id
        };

        let written = self.write_back(frame_id, page_id);
        self.unpin_page(page_id, false)?;
        written.map(|()| true)
    }

    /// Flush every resident page and sync the file.
    pub fn flush_all_pages(&self) -> Result<()> {
        let resident: Vec<PageId> = {
            let state = self.state.lock();
            state.page_table.keys().copied().collect()
        };

        for page_id in resident {
            self.flush_page(page_id)?;
        }

        self.disk_manager.lock().sync()
    }

    // ========================================================================
    // Public API: Stats and info
    // ========================================================================

    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn free_frame_count(&self) -> usize {
        self.state.lock().free_list.len()
    }

    /// Number of resident pages.
    pub fn page_count(&self) -> usize {
        self.state.lock().page_table.len()
    }

    /// Number of frames the replacer could evict right now.
    pub fn evictable_frame_count(&self) -> usize {
        self.replacer.size()
    }

    // ========================================================================
    // Internal: guard support
    // ========================================================================

    #[inline]
    pub(crate) fn frame(&self, frame_id: FrameId) -> &Frame {
        &self.frames[frame_id.0]
    }

    /// Unpin on behalf of a guard being released.
    pub(crate) fn release(&self, page_id: PageId, is_dirty: bool) {
        if let Err(err) = self.unpin_page(page_id, is_dirty) {
            error!(%page_id, %err, "page guard release failed");
        }
    }

    // ========================================================================
    // Internal: frame management
    // ========================================================================

    /// Pin `page_id`, loading it from disk if needed.
    fn pin_page(&self, page_id: PageId) -> Result<FrameId> {
        if !page_id.is_valid() {
            return Err(Error::InvalidPageId(page_id.0));
        }

        let mut state = self.state.lock();

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            self.frames[frame_id.0].pin();
            self.replacer.record_access(frame_id)?;
            self.replacer.set_evictable(frame_id, false)?;
            self.stats.record_hit();
            return Ok(frame_id);
        }

        self.stats.record_miss();
        let frame_id = self.acquire_frame(&mut state)?;
        let frame = &self.frames[frame_id.0];

        let loaded = {
            let mut page = frame.page_mut();
            self.disk_manager.lock().read_page(page_id, &mut page)
        };
        if let Err(err) = loaded {
            frame.reset();
            state.free_list.push(frame_id);
            return Err(err);
        }
        self.stats.record_disk_read();

        self.install(&mut state, frame_id, page_id)?;
        Ok(frame_id)
    }

    /// Register `page_id` in `frame_id`, pinned once and not evictable.
    fn install(&self, state: &mut PoolState, frame_id: FrameId, page_id: PageId) -> Result<()> {
        let frame = &self.frames[frame_id.0];
        frame.set_page_id(Some(page_id));
        frame.clear_dirty();
        frame.pin();

        self.replacer.record_access(frame_id)?;
        self.replacer.set_evictable(frame_id, false)?;
        state.page_table.insert(page_id, frame_id);
        Ok(())
    }

    /// Take a frame from the free list, or evict one.
    ///
    /// A dirty victim is written back first. If that write fails the victim
    /// is handed back to the replacer and the error is returned.
    fn acquire_frame(&self, state: &mut PoolState) -> Result<FrameId> {
        if let Some(frame_id) = state.free_list.pop() {
            return Ok(frame_id);
        }

        let frame_id = self.replacer.evict().ok_or(Error::NoFreeFrames)?;
        let frame = &self.frames[frame_id.0];
        let Some(victim) = frame.page_id() else {
            return Ok(frame_id);
        };

        let dirty = frame.is_dirty();
        if dirty {
            if let Err(err) = self.write_back(frame_id, victim) {
                self.replacer.record_access(frame_id)?;
                self.replacer.set_evictable(frame_id, true)?;
                return Err(err);
            }
        }

        state.page_table.remove(&victim);
        frame.set_page_id(None);
        self.stats.record_eviction();
        debug!(page_id = %victim, frame = %frame_id, dirty, "evicted page");
        Ok(frame_id)
    }

    /// Remove an unpinned resident page from the pool and release its slot.
    fn discard(&self, state: &mut PoolState, frame_id: FrameId, page_id: PageId) -> Result<()> {
        let frame = &self.frames[frame_id.0];
        if frame.is_dirty() {
            self.write_back(frame_id, page_id)?;
        }

        self.replacer.remove(frame_id)?;
        state.page_table.remove(&page_id);
        state.pending_deletes.remove(&page_id);
        frame.reset();
        state.free_list.push(frame_id);

        self.disk_manager.lock().deallocate_page(page_id)?;
        self.stats.record_delete();
        debug!(%page_id, frame = %frame_id, "deleted page");
        Ok(())
    }

    /// Write a frame's bytes to disk under its shared latch.
    fn write_back(&self, frame_id: FrameId, page_id: PageId) -> Result<()> {
        let frame = &self.frames[frame_id.0];
        let page = frame.page();
        self.disk_manager.lock().write_page(page_id, &page)?;
        frame.clear_dirty();
        self.stats.record_disk_write();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn create_test_bpm(pool_size: usize) -> (BufferPoolManager, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let dm = DiskManager::create(dir.path().join("test.db")).unwrap();
        (BufferPoolManager::new(pool_size, 2, dm).unwrap(), dir)
    }

    #[test]
    fn test_rejects_empty_pool() {
        let dir = tempdir().unwrap();
        let dm = DiskManager::create(dir.path().join("test.db")).unwrap();
        assert!(matches!(
            BufferPoolManager::new(0, 2, dm),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_new_page() {
        let (bpm, _dir) = create_test_bpm(10);

        let guard = bpm.new_page().unwrap();
        assert_eq!(guard.page_id(), PageId::new(0));
        assert_eq!(guard.frame_id(), FrameId::new(0));
        drop(guard);

        let guard = bpm.new_page().unwrap();
        assert_eq!(guard.page_id(), PageId::new(1));
        assert_eq!(bpm.page_count(), 2);
        assert_eq!(bpm.free_frame_count(), 8);
    }

    #[test]
    fn test_cache_hit_and_miss() {
        let (bpm, _dir) = create_test_bpm(10);
        let pid = bpm.new_page().unwrap().page_id();

        drop(bpm.fetch_page_read(pid).unwrap());
        drop(bpm.fetch_page_read(pid).unwrap());

        let snapshot = bpm.stats().snapshot();
        assert_eq!(snapshot.cache_hits, 2);
        assert_eq!(snapshot.cache_misses, 0);
    }

    #[test]
    fn test_lru_k_prefers_cold_victim() {
        let (bpm, _dir) = create_test_bpm(2);

        let a = bpm.new_page().unwrap().page_id();
        let b = bpm.new_page().unwrap().page_id();
        drop(bpm.fetch_page_read(a).unwrap());

        // A has two accesses, B one: B is the victim.
        let c = bpm.new_page().unwrap().page_id();
        assert!(bpm.contains_page(a));
        assert!(!bpm.contains_page(b));
        assert!(bpm.contains_page(c));
        assert_eq!(bpm.stats().snapshot().evictions, 1);
    }

    #[test]
    fn test_dirty_page_flushed_on_eviction() {
        let (bpm, _dir) = create_test_bpm(1);

        {
            let mut guard = bpm.new_page().unwrap();
            guard.as_mut_slice()[0] = 0x42;
        }

        drop(bpm.new_page().unwrap());
        assert_eq!(bpm.stats().snapshot().pages_written, 1);

        let guard = bpm.fetch_page_read(PageId::new(0)).unwrap();
        assert_eq!(guard.as_slice()[0], 0x42);
    }

    #[test]
    fn test_unpin_page_errors() {
        let (bpm, _dir) = create_test_bpm(4);
        let pid = bpm.new_page().unwrap().page_id();

        assert!(matches!(
            bpm.unpin_page(pid, false),
            Err(Error::PageNotPinned(_))
        ));
        assert!(matches!(
            bpm.unpin_page(PageId::new(77), false),
            Err(Error::PageNotResident(77))
        ));
    }

    #[test]
    fn test_dirty_flag_is_sticky() {
        let (bpm, _dir) = create_test_bpm(4);
        let pid = bpm.new_page().unwrap().page_id();

        let guard = bpm.fetch_page_basic(pid).unwrap();
        let frame = bpm.frame(guard.frame_id());
        assert!(frame.is_dirty());

        // A clean unpin leaves the flag alone.
        drop(guard);
        assert!(frame.is_dirty());

        assert!(bpm.flush_page(pid).unwrap());
        assert!(!frame.is_dirty());
    }

    #[test]
    fn test_delete_page() {
        let (bpm, _dir) = create_test_bpm(10);
        let pid = bpm.new_page().unwrap().page_id();

        bpm.delete_page(pid).unwrap();
        assert_eq!(bpm.free_frame_count(), 10);
        assert_eq!(bpm.page_count(), 0);
        assert_eq!(bpm.evictable_frame_count(), 0);
        assert_eq!(bpm.stats().snapshot().pages_deleted, 1);

        // Not resident any more: still fine.
        bpm.delete_page(pid).unwrap();

        // The slot is reused by the next allocation.
        assert_eq!(bpm.new_page().unwrap().page_id(), pid);
    }

    #[test]
    fn test_delete_pinned_page_fails() {
        let (bpm, _dir) = create_test_bpm(10);
        let guard = bpm.new_page().unwrap();

        assert!(matches!(
            bpm.delete_page(guard.page_id()),
            Err(Error::PagePinned(0))
        ));
    }

    #[test]
    fn test_deferred_delete_runs_on_last_unpin() {
        let (bpm, _dir) = create_test_bpm(4);
        let pid = bpm.new_page().unwrap().page_id();
        let g1 = bpm.fetch_page_read(pid).unwrap();
        let g2 = bpm.fetch_page_basic(pid).unwrap();

        assert!(!bpm.delete_page_when_unpinned(pid).unwrap());
        assert_eq!(bpm.pending_delete_count(), 1);

        drop(g1);
        assert!(bpm.contains_page(pid));
        drop(g2);
        assert!(!bpm.contains_page(pid));
        assert_eq!(bpm.pending_delete_count(), 0);
        assert_eq!(bpm.free_frame_count(), 4);
        assert_eq!(bpm.stats().snapshot().pages_deleted, 1);
        assert_eq!(bpm.new_page().unwrap().page_id(), pid);
    }

    #[test]
    fn test_deferred_delete_of_evicted_page_releases_slot() {
        let (bpm, _dir) = create_test_bpm(1);
        let evicted = bpm.new_page().unwrap().page_id();
        let resident = bpm.new_page().unwrap().page_id();
        assert!(!bpm.contains_page(evicted));

        assert!(bpm.delete_page_when_unpinned(evicted).unwrap());
        assert_eq!(bpm.stats().snapshot().pages_deleted, 1);
        assert!(bpm.contains_page(resident));

        assert!(bpm.delete_page_when_unpinned(resident).unwrap());
        assert_eq!(bpm.new_page().unwrap().page_id(), evicted);
        assert!(matches!(
            bpm.delete_page_when_unpinned(PageId::INVALID),
            Err(Error::InvalidPageId(_))
        ));
    }

    #[test]
    fn test_flush_page() {
        let (bpm, _dir) = create_test_bpm(10);
        {
            let mut guard = bpm.new_page().unwrap();
            guard.as_mut_slice()[0] = 0xFF;
        }

        assert!(bpm.flush_page(PageId::new(0)).unwrap());
        assert!(!bpm.flush_page(PageId::new(5)).unwrap());
        assert!(!bpm.flush_page(PageId::INVALID).unwrap());
        assert_eq!(bpm.get_pin_count(PageId::new(0)), Some(0));
        assert_eq!(bpm.evictable_frame_count(), 1);
        assert!(bpm.stats().snapshot().pages_written >= 1);
    }

    #[test]
    fn test_flush_all_pages() {
        let (bpm, _dir) = create_test_bpm(10);
        for i in 0..5 {
            let mut guard = bpm.new_page().unwrap();
            guard.as_mut_slice()[0] = i;
        }

        bpm.flush_all_pages().unwrap();
        assert_eq!(bpm.stats().snapshot().pages_written, 5);
    }

    #[test]
    fn test_no_free_frames() {
        let (bpm, _dir) = create_test_bpm(2);

        let _guard1 = bpm.new_page().unwrap();
        let _guard2 = bpm.new_page().unwrap();

        assert!(matches!(bpm.new_page(), Err(Error::NoFreeFrames)));
        // Failed allocation must not leak the frame or a page table entry.
        assert_eq!(bpm.page_count(), 2);
    }

    #[test]
    fn test_missing_page_returns_frame() {
        let (bpm, _dir) = create_test_bpm(2);

        assert!(matches!(
            bpm.fetch_page_read(PageId::new(999)),
            Err(Error::PageNotFound(999))
        ));
        assert!(matches!(
            bpm.fetch_page_read(PageId::INVALID),
            Err(Error::InvalidPageId(_))
        ));
        assert_eq!(bpm.free_frame_count(), 2);
    }

    #[test]
    fn test_pin_count_tracking() {
        let (bpm, _dir) = create_test_bpm(10);
        let pid = bpm.new_page().unwrap().page_id();
        assert_eq!(bpm.get_pin_count(pid), Some(0));

        let g1 = bpm.fetch_page_read(pid).unwrap();
        let g2 = bpm.fetch_page_basic(pid).unwrap();
        assert_eq!(bpm.get_pin_count(pid), Some(2));
        assert_eq!(bpm.evictable_frame_count(), 0);

        drop(g1);
        drop(g2);
        assert_eq!(bpm.get_pin_count(pid), Some(0));
        assert_eq!(bpm.evictable_frame_count(), 1);
    }

    #[test]
    fn test_read_guard_into_basic_keeps_pin() {
        let (bpm, _dir) = create_test_bpm(4);
        let pid = bpm.new_page().unwrap().page_id();

        let basic = bpm.fetch_page_read(pid).unwrap().into_basic();
        assert_eq!(bpm.get_pin_count(pid), Some(1));

        // Latch was released: a writer can get in.
        drop(bpm.fetch_page_write(pid).unwrap());
        drop(basic);
        assert_eq!(bpm.get_pin_count(pid), Some(0));
    }

    #[test]
    fn test_basic_guard_write_marks_dirty() {
        let (bpm, _dir) = create_test_bpm(4);
        let pid = bpm.new_page().unwrap().page_id();
        bpm.flush_page(pid).unwrap();

        let mut guard = bpm.fetch_page_basic(pid).unwrap();
        guard.write().as_mut_slice()[9] = 3;
        let frame_id = guard.frame_id();
        drop(guard);

        assert!(bpm.frame(frame_id).is_dirty());
        assert_eq!(bpm.fetch_page_read(pid).unwrap().as_slice()[9], 3);
    }

    #[test]
    fn test_concurrent_reads() {
        use std::sync::Arc;
        use std::thread;

        let (bpm, _dir) = create_test_bpm(10);
        let bpm = Arc::new(bpm);
        {
            let mut guard = bpm.new_page().unwrap();
            guard.as_mut_slice()[0] = 0x42;
        }

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let bpm = Arc::clone(&bpm);
                thread::spawn(move || {
                    let guard = bpm.fetch_page_read(PageId::new(0)).unwrap();
                    assert_eq!(guard.as_slice()[0], 0x42);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(bpm.get_pin_count(PageId::new(0)), Some(0));
    }
}
