//! Frame - a slot in the buffer pool.
//!
//! A [`Frame`] holds a [`Page`] plus the bookkeeping the pool needs:
//! which page is loaded, how many holders pin it, and whether it has been
//! modified since it was last written back.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::PageId;
use crate::storage::page::Page;

/// A frame in the buffer pool.
///
/// The page bytes sit behind a reader/writer latch; the metadata is atomic
/// so it can be inspected without taking the latch. Pin count and page id
/// are only changed while the buffer pool's state mutex is held, which is
/// what keeps the page table and the frames consistent.
pub struct Frame {
    page: RwLock<Page>,
    /// Loaded page, `PageId::INVALID` when the frame is empty.
    page_id: AtomicU32,
    pin_count: AtomicU32,
    is_dirty: AtomicBool,
}

impl Frame {
    pub fn new() -> Self {
        Self {
            page: RwLock::new(Page::new()),
            page_id: AtomicU32::new(PageId::INVALID.0),
            pin_count: AtomicU32::new(0),
            is_dirty: AtomicBool::new(false),
        }
    }

    /// Acquire the shared latch on the page.
    #[inline]
    pub fn page(&self) -> RwLockReadGuard<'_, Page> {
        self.page.read()
    }

    /// Acquire the exclusive latch on the page.
    #[inline]
    pub fn page_mut(&self) -> RwLockWriteGuard<'_, Page> {
        self.page.write()
    }

    #[inline]
    pub fn page_id(&self) -> Option<PageId> {
        let id = PageId(self.page_id.load(Ordering::Acquire));
        id.is_valid().then_some(id)
    }

    #[inline]
    pub fn set_page_id(&self, page_id: Option<PageId>) {
        let raw = page_id.unwrap_or(PageId::INVALID).0;
        self.page_id.store(raw, Ordering::Release);
    }

    /// Increment the pin count. Returns the new pin count.
    #[inline]
    pub fn pin(&self) -> u32 {
        self.pin_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Decrement the pin count. Returns the new count, or `None` if the
    /// frame was not pinned (the count is left at zero).
    #[inline]
    pub fn unpin(&self) -> Option<u32> {
        self.pin_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .ok()
            .map(|old| old - 1)
    }

    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.pin_count() > 0
    }

    #[inline]
    pub fn mark_dirty(&self) {
        self.is_dirty.store(true, Ordering::Release);
    }

    #[inline]
    pub fn clear_dirty(&self) {
        self.is_dirty.store(false, Ordering::Release);
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.is_dirty.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.page_id().is_none()
    }

    /// Reset the frame to empty state.
    ///
    /// Only valid for an unpinned frame: takes the exclusive latch to zero
    /// the bytes.
    pub fn reset(&self) {
        self.page_mut().reset();
        self.set_page_id(None);
        self.pin_count.store(0, Ordering::Release);
        self.clear_dirty();
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}
