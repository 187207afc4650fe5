//! Common node header shared by leaf and internal pages.
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       5     PageHeader (type = BTreeLeaf | BTreeInternal, checksum unused)
//! 5       4     size: number of entries
//! 9       4     max_size
//! 13      4     parent page id (INVALID for the root)
//! 17      4     own page id
//! 21      4     next leaf page id (leaves only)
//! 25      ...   entries
//! ```

use crate::common::{Error, PageId, Result};
use crate::storage::page::{read_u32, write_u32, PageHeader, PageType};

const OFFSET_SIZE: usize = PageHeader::SIZE;
const OFFSET_MAX_SIZE: usize = OFFSET_SIZE + 4;
const OFFSET_PARENT: usize = OFFSET_MAX_SIZE + 4;
const OFFSET_PAGE_ID: usize = OFFSET_PARENT + 4;
pub(crate) const OFFSET_NEXT: usize = OFFSET_PAGE_ID + 4;

/// Bytes before the first entry.
pub(crate) const NODE_HEADER_SIZE: usize = OFFSET_NEXT + 4;

/// What a write descent is going to do once it reaches the leaf. Reads
/// release each parent as soon as the child is latched and never ask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Insert,
    Remove,
}

/// Untyped view of a tree node: just the header fields.
pub struct TreePage<B> {
    data: B,
}

impl<B: AsRef<[u8]>> TreePage<B> {
    pub fn new(data: B) -> Self {
        Self { data }
    }

    #[inline]
    pub(crate) fn bytes(&self) -> &[u8] {
        self.data.as_ref()
    }

    #[inline]
    pub fn page_type(&self) -> PageType {
        PageType::of(self.bytes())
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.page_type() == PageType::BTreeLeaf
    }

    #[inline]
    pub fn size(&self) -> usize {
        read_u32(self.bytes(), OFFSET_SIZE) as usize
    }

    #[inline]
    pub fn max_size(&self) -> usize {
        read_u32(self.bytes(), OFFSET_MAX_SIZE) as usize
    }

    /// Fewest entries a non-root node may hold.
    ///
    /// Leaves split as soon as they reach `max_size`, so they settle at
    /// `max_size / 2`. Internal nodes split one entry later and settle at
    /// `ceil(max_size / 2)`.
    pub fn min_size(&self) -> usize {
        if self.is_leaf() {
            self.max_size() / 2
        } else {
            self.max_size().div_ceil(2)
        }
    }

    #[inline]
    pub fn parent_page_id(&self) -> PageId {
        PageId(read_u32(self.bytes(), OFFSET_PARENT))
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        PageId(read_u32(self.bytes(), OFFSET_PAGE_ID))
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        !self.parent_page_id().is_valid()
    }

    /// Whether `op` on this node is guaranteed not to restructure it, so
    /// every latch above it can be dropped.
    ///
    /// Insert: a leaf splits on reaching `max_size`, an internal node on
    /// exceeding it. The root keeps one extra free slot in reserve.
    /// Remove: a non-root node must stay at or above `min_size`. A leaf root
    /// only needs to keep one entry, an internal root two children.
    pub fn is_safe(&self, op: Operation) -> bool {
        let size = self.size();
        match op {
            Operation::Insert => {
                let limit = if self.is_leaf() {
                    self.max_size().saturating_sub(1)
                } else {
                    self.max_size()
                };
                let headroom = if self.is_root() { 2 } else { 1 };
                size + headroom <= limit
            }
            Operation::Remove => match (self.is_root(), self.is_leaf()) {
                (true, true) => size > 1,
                (true, false) => size > 2,
                (false, _) => size > self.min_size(),
            },
        }
    }

    /// Check that the page holds a tree node and claims to be `expected`.
    pub fn validate(&self, expected: PageId) -> Result<()> {
        match self.page_type() {
            PageType::BTreeLeaf | PageType::BTreeInternal => {}
            other => {
                return Err(Error::corrupted(
                    expected.0,
                    format!("expected a tree node, found {:?}", other),
                ))
            }
        }
        if self.page_id() != expected {
            return Err(Error::corrupted(
                expected.0,
                format!("node header names {}", self.page_id()),
            ));
        }
        Ok(())
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> TreePage<B> {
    #[inline]
    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        self.data.as_mut()
    }

    /// Format an empty node.
    pub(crate) fn init(
        &mut self,
        page_type: PageType,
        page_id: PageId,
        parent_id: PageId,
        max_size: usize,
    ) {
        let bytes = self.bytes_mut();
        bytes[..NODE_HEADER_SIZE].fill(0);
        PageHeader::new(page_type).write(bytes);
        write_u32(bytes, OFFSET_MAX_SIZE, max_size as u32);
        write_u32(bytes, OFFSET_PARENT, parent_id.0);
        write_u32(bytes, OFFSET_PAGE_ID, page_id.0);
        write_u32(bytes, OFFSET_NEXT, PageId::INVALID.0);
    }

    #[inline]
    pub(crate) fn set_size(&mut self, size: usize) {
        write_u32(self.bytes_mut(), OFFSET_SIZE, size as u32);
    }

    #[inline]
    pub fn set_parent_page_id(&mut self, parent_id: PageId) {
        write_u32(self.bytes_mut(), OFFSET_PARENT, parent_id.0);
    }
}
