//! Per-operation latch bookkeeping for mutating tree operations.

use std::collections::VecDeque;

use parking_lot::RwLockWriteGuard;
use tracing::warn;

use crate::buffer::{BufferPoolManager, PageWriteGuard};
use crate::common::{Error, PageId, Result};

/// Latches held by one insert or remove, outermost first.
///
/// `root` is the tree-wide root-change lock. It is held only while the
/// descent has not yet passed a safe node. Once the context is dropped (or
/// [`finish`](Self::finish)ed) every latch is released; pages scheduled for
/// deletion are deleted only after that.
pub(crate) struct Context<'a> {
    root: Option<RwLockWriteGuard<'a, PageId>>,
    pub(crate) write_set: VecDeque<PageWriteGuard<'a>>,
    deleted: Vec<PageId>,
}

impl<'a> Context<'a> {
    pub(crate) fn new(root: RwLockWriteGuard<'a, PageId>) -> Self {
        Self {
            root: Some(root),
            write_set: VecDeque::new(),
            deleted: Vec::new(),
        }
    }

    /// Current root id. Only meaningful while the root lock is held.
    pub(crate) fn root_id(&self) -> Option<PageId> {
        self.root.as_deref().copied()
    }

    pub(crate) fn holds_root(&self) -> bool {
        self.root.is_some()
    }

    /// Release the root lock and every latched ancestor.
    pub(crate) fn release_ancestors(&mut self) {
        self.root = None;
        while let Some(mut guard) = self.write_set.pop_front() {
            guard.drop_guard();
        }
    }

    /// Replace the root id. Fails if the root lock was already given up.
    pub(crate) fn set_root(&mut self, root: PageId) -> Result<()> {
        match self.root.as_deref_mut() {
            Some(slot) => {
                *slot = root;
                Ok(())
            }
            None => Err(Error::TreeInvariant(format!(
                "root change to {} without the root lock",
                root
            ))),
        }
    }

    pub(crate) fn schedule_delete(&mut self, page_id: PageId) {
        self.deleted.push(page_id);
    }

    /// Release all latches, then delete scheduled pages. A page some other
    /// holder (an iterator, a reader) still pins is deleted by the pool when
    /// that holder lets go.
    pub(crate) fn finish(mut self, bpm: &BufferPoolManager) {
        self.release_ancestors();
        for page_id in std::mem::take(&mut self.deleted) {
            if let Err(err) = bpm.delete_page_when_unpinned(page_id) {
                warn!(%page_id, %err, "deferred page delete failed");
            }
        }
    }
}
