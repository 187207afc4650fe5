//! RAII guards for page access.
//!
//! - [`PageReadGuard`] - pin + shared latch (many at once)
//! - [`PageWriteGuard`] - pin + exclusive latch, marks the page dirty
//! - [`PageGuard`] - pin only; the latch is taken on demand
//!
//! Every guard releases its latch first and then unpins, either when dropped
//! or earlier through `drop_guard()`. Releasing twice is a no-op, so a guard
//! that was released early can still fall out of scope normally.

use std::ops::{Deref, DerefMut};

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::common::{FrameId, PageId};
use crate::storage::page::Page;

use super::buffer_pool_manager::BufferPoolManager;

/// Guard for read-only page access.
///
/// # Example
/// ```ignore
/// let guard = bpm.fetch_page_read(page_id)?;
/// let data = guard.as_slice();
/// // guard drops here: latch released, page unpinned
/// ```
pub struct PageReadGuard<'a> {
    bpm: &'a BufferPoolManager,
    frame_id: FrameId,
    page_id: PageId,
    lock: Option<RwLockReadGuard<'a, Page>>,
}

impl<'a> PageReadGuard<'a> {
    pub(crate) fn new(
        bpm: &'a BufferPoolManager,
        frame_id: FrameId,
        page_id: PageId,
        lock: RwLockReadGuard<'a, Page>,
    ) -> Self {
        Self {
            bpm,
            frame_id,
            page_id,
            lock: Some(lock),
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// Release the latch and the pin now. Later calls do nothing.
    pub fn drop_guard(&mut self) {
        if let Some(lock) = self.lock.take() {
            drop(lock);
            self.bpm.release(self.page_id, false);
        }
    }

    /// Give up the latch but keep the page pinned.
    pub fn into_basic(mut self) -> PageGuard<'a> {
        let pinned = self.lock.take().is_some();
        PageGuard {
            bpm: self.bpm,
            frame_id: self.frame_id,
            page_id: self.page_id,
            pinned,
            dirty: false,
        }
    }
}

impl Deref for PageReadGuard<'_> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        self.lock
            .as_deref()
            .expect("PageReadGuard used after drop_guard")
    }
}

impl Drop for PageReadGuard<'_> {
    fn drop(&mut self) {
        self.drop_guard();
    }
}

/// Guard for exclusive write access to a page.
///
/// The page is marked dirty when the guard is released.
///
/// # Example
/// ```ignore
/// let mut guard = bpm.fetch_page_write(page_id)?;
/// guard.as_mut_slice()[0] = 0xFF;
/// // guard drops here: latch released, page marked dirty and unpinned
/// ```
pub struct PageWriteGuard<'a> {
    bpm: &'a BufferPoolManager,
    frame_id: FrameId,
    page_id: PageId,
    lock: Option<RwLockWriteGuard<'a, Page>>,
}

impl<'a> PageWriteGuard<'a> {
    pub(crate) fn new(
        bpm: &'a BufferPoolManager,
        frame_id: FrameId,
        page_id: PageId,
        lock: RwLockWriteGuard<'a, Page>,
    ) -> Self {
        Self {
            bpm,
            frame_id,
            page_id,
            lock: Some(lock),
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// Release the latch and the pin now. Later calls do nothing.
    pub fn drop_guard(&mut self) {
        if let Some(lock) = self.lock.take() {
            drop(lock);
            self.bpm.release(self.page_id, true);
        }
    }
}

impl Deref for PageWriteGuard<'_> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        self.lock
            .as_deref()
            .expect("PageWriteGuard used after drop_guard")
    }
}

impl DerefMut for PageWriteGuard<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Page {
        self.lock
            .as_deref_mut()
            .expect("PageWriteGuard used after drop_guard")
    }
}

impl Drop for PageWriteGuard<'_> {
    fn drop(&mut self) {
        self.drop_guard();
    }
}

/// Guard holding only a pin.
///
/// Keeps the page resident without blocking writers. Callers latch it for
/// the short span they actually touch the bytes:
///
/// ```ignore
/// let guard = bpm.fetch_page_basic(page_id)?;
/// let first = guard.read().as_slice()[0];
/// ```
pub struct PageGuard<'a> {
    bpm: &'a BufferPoolManager,
    frame_id: FrameId,
    page_id: PageId,
    pinned: bool,
    dirty: bool,
}

impl<'a> PageGuard<'a> {
    pub(crate) fn new(bpm: &'a BufferPoolManager, frame_id: FrameId, page_id: PageId) -> Self {
        Self {
            bpm,
            frame_id,
            page_id,
            pinned: true,
            dirty: false,
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// Take the shared latch for the lifetime of the returned guard.
    pub fn read(&self) -> RwLockReadGuard<'_, Page> {
        debug_assert!(self.pinned, "PageGuard used after drop_guard");
        self.bpm.frame(self.frame_id).page()
    }

    /// Take the exclusive latch. The page is marked dirty on release.
    pub fn write(&mut self) -> RwLockWriteGuard<'_, Page> {
        debug_assert!(self.pinned, "PageGuard used after drop_guard");
        self.dirty = true;
        self.bpm.frame(self.frame_id).page_mut()
    }

    /// Release the pin now. Later calls do nothing.
    pub fn drop_guard(&mut self) {
        if std::mem::take(&mut self.pinned) {
            self.bpm.release(self.page_id, self.dirty);
        }
    }
}

impl Drop for PageGuard<'_> {
    fn drop(&mut self) {
        self.drop_guard();
    }
}
