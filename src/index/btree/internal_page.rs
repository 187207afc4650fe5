//! Internal node page.

use std::marker::PhantomData;
use std::ops::{Deref, DerefMut, Range};

use crate::buffer::BufferPoolManager;
use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, Result};
use crate::storage::page::PageType;

use super::codec::Storable;
use super::node::{TreePage, NODE_HEADER_SIZE};

/// Typed view of an internal node: `size` child pointers separated by
/// `size - 1` keys.
///
/// ```text
/// | node header | (unused) P0 | K1 P1 | K2 P2 | ... | K(size-1) P(size-1) |
/// ```
///
/// Everything under `P(i)` is `>= K(i)` and `< K(i+1)`. The key in slot 0 is
/// never read by lookups; merges and redistributions park the separator
/// pulled down from the parent there.
pub struct InternalNode<B, K> {
    page: TreePage<B>,
    _marker: PhantomData<fn() -> K>,
}

impl<B, K> Deref for InternalNode<B, K> {
    type Target = TreePage<B>;

    fn deref(&self) -> &TreePage<B> {
        &self.page
    }
}

impl<B, K> DerefMut for InternalNode<B, K> {
    fn deref_mut(&mut self) -> &mut TreePage<B> {
        &mut self.page
    }
}

impl<B, K: Storable> InternalNode<B, K> {
    pub const ENTRY_SIZE: usize = K::ENCODED_LEN + PageId::ENCODED_LEN;

    /// Entries that physically fit in one page. A node is allowed to grow
    /// to `max_size + 1` before it splits, so `max_size < CAPACITY`.
    pub const CAPACITY: usize = (PAGE_SIZE - NODE_HEADER_SIZE) / Self::ENTRY_SIZE;

    #[inline]
    fn offset(index: usize) -> usize {
        NODE_HEADER_SIZE + index * Self::ENTRY_SIZE
    }
}

impl<B: AsRef<[u8]>, K: Storable + Ord> InternalNode<B, K> {
    pub fn new(data: B) -> Self {
        Self {
            page: TreePage::new(data),
            _marker: PhantomData,
        }
    }

    pub fn key_at(&self, index: usize) -> K {
        K::decode(&self.bytes()[Self::offset(index)..])
    }

    pub fn value_at(&self, index: usize) -> PageId {
        PageId::decode(&self.bytes()[Self::offset(index) + K::ENCODED_LEN..])
    }

    /// Slot holding the child pointer `value`.
    pub fn value_index(&self, value: PageId) -> Option<usize> {
        (0..self.size()).find(|&i| self.value_at(i) == value)
    }

    /// Child whose subtree may contain `key`.
    pub fn lookup(&self, key: &K) -> PageId {
        // First slot in 1..size whose key is strictly greater than `key`.
        let (mut lo, mut hi) = (1, self.size());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.key_at(mid) <= *key {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        self.value_at(lo - 1)
    }

    /// All child pointers in slot order.
    pub fn children(&self) -> Vec<PageId> {
        (0..self.size()).map(|i| self.value_at(i)).collect()
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>, K: Storable + Ord> InternalNode<B, K> {
    /// Format an empty internal node.
    pub fn init(&mut self, page_id: PageId, parent_id: PageId, max_size: usize) {
        debug_assert!(max_size < Self::CAPACITY);
        self.page
            .init(PageType::BTreeInternal, page_id, parent_id, max_size);
    }

    pub fn set_key_at(&mut self, index: usize, key: &K) {
        let off = Self::offset(index);
        key.encode(&mut self.bytes_mut()[off..off + K::ENCODED_LEN]);
    }

    fn set_value_at(&mut self, index: usize, value: PageId) {
        let off = Self::offset(index) + K::ENCODED_LEN;
        value.encode(&mut self.bytes_mut()[off..off + PageId::ENCODED_LEN]);
    }

    fn shift(&mut self, from: usize, delta: isize) {
        let size = self.size();
        let src = Self::offset(from)..Self::offset(size);
        let dest = (Self::offset(from) as isize + delta * Self::ENTRY_SIZE as isize) as usize;
        self.bytes_mut().copy_within(src, dest);
    }

    fn append_from<C: AsRef<[u8]>>(&mut self, src: &InternalNode<C, K>, range: Range<usize>) {
        let size = self.size();
        let count = range.len();
        let from = Self::offset(range.start)..Self::offset(range.end);
        let to = Self::offset(size);
        self.bytes_mut()[to..to + from.len()].copy_from_slice(&src.bytes()[from]);
        self.set_size(size + count);
    }

    /// Turn an empty node into a root with two children.
    pub fn populate_new_root(&mut self, left: PageId, key: &K, right: PageId) {
        self.set_value_at(0, left);
        self.set_key_at(1, key);
        self.set_value_at(1, right);
        self.set_size(2);
    }

    /// Insert `(key, new_child)` right after the slot pointing at
    /// `old_child`. Returns the size afterwards.
    pub fn insert_node_after(&mut self, old_child: PageId, key: &K, new_child: PageId) -> Result<usize> {
        let index = self.value_index(old_child).ok_or_else(|| {
            Error::TreeInvariant(format!(
                "{} is not a child of {}",
                old_child,
                self.page_id()
            ))
        })? + 1;
        debug_assert!(self.size() < Self::CAPACITY, "internal node overflow");

        self.shift(index, 1);
        self.set_key_at(index, key);
        self.set_value_at(index, new_child);
        let size = self.size() + 1;
        self.set_size(size);
        Ok(size)
    }

    /// Drop the entry at `index`.
    pub fn remove(&mut self, index: usize) {
        let size = self.size();
        debug_assert!(index < size);
        self.shift(index + 1, -1);
        self.set_size(size - 1);
    }

    /// Empty a root that is down to one child and return that child.
    pub fn remove_and_return_only_child(&mut self) -> PageId {
        debug_assert_eq!(self.size(), 1);
        let child = self.value_at(0);
        self.set_size(0);
        child
    }

    /// Split: move the upper half into the empty `recipient` and re-parent
    /// the moved children. `recipient.key_at(0)` is then the separator to
    /// push into the parent.
    pub fn move_half_to<C>(&mut self, recipient: &mut InternalNode<C, K>, bpm: &BufferPoolManager) -> Result<()>
    where
        C: AsRef<[u8]> + AsMut<[u8]>,
    {
        let size = self.size();
        let keep = size - size / 2;
        recipient.append_from(self, keep..size);
        self.set_size(keep);

        let new_parent = recipient.page_id();
        for child in recipient.children() {
            adopt(bpm, child, new_parent)?;
        }
        Ok(())
    }

    /// Merge: append every entry to the left neighbour `recipient`.
    /// `middle_key` is the parent's separator between the two nodes.
    pub fn move_all_to<C>(
        &mut self,
        recipient: &mut InternalNode<C, K>,
        middle_key: &K,
        bpm: &BufferPoolManager,
    ) -> Result<()>
    where
        C: AsRef<[u8]> + AsMut<[u8]>,
    {
        let size = self.size();
        self.set_key_at(0, middle_key);
        let moved = self.children();
        recipient.append_from(self, 0..size);
        self.set_size(0);

        let new_parent = recipient.page_id();
        for child in moved {
            adopt(bpm, child, new_parent)?;
        }
        Ok(())
    }

    /// Redistribute: move the first child to the end of the left neighbour
    /// `recipient`. Afterwards `self.key_at(0)` is the new separator.
    pub fn move_first_to_end_of<C>(
        &mut self,
        recipient: &mut InternalNode<C, K>,
        middle_key: &K,
        bpm: &BufferPoolManager,
    ) -> Result<()>
    where
        C: AsRef<[u8]> + AsMut<[u8]>,
    {
        let child = self.value_at(0);
        let at = recipient.size();
        recipient.set_key_at(at, middle_key);
        recipient.set_value_at(at, child);
        recipient.set_size(at + 1);

        self.remove(0);
        adopt(bpm, child, recipient.page_id())
    }

    /// Redistribute: move the last child to the front of the right neighbour
    /// `recipient`. Afterwards `recipient.key_at(0)` is the new separator.
    pub fn move_last_to_front_of<C>(
        &mut self,
        recipient: &mut InternalNode<C, K>,
        middle_key: &K,
        bpm: &BufferPoolManager,
    ) -> Result<()>
    where
        C: AsRef<[u8]> + AsMut<[u8]>,
    {
        let last = self.size() - 1;
        let key = self.key_at(last);
        let child = self.value_at(last);
        self.set_size(last);

        recipient.set_key_at(0, middle_key);
        recipient.shift(0, 1);
        recipient.set_key_at(0, &key);
        recipient.set_value_at(0, child);
        let size = recipient.size() + 1;
        recipient.set_size(size);

        adopt(bpm, child, recipient.page_id())
    }
}

/// Point `child`'s parent link at `parent`.
pub(crate) fn adopt(bpm: &BufferPoolManager, child: PageId, parent: PageId) -> Result<()> {
    let mut guard = bpm.fetch_page_write(child)?;
    let mut node = TreePage::new(guard.as_mut_slice());
    node.validate(child)?;
    node.set_parent_page_id(parent);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::btree::leaf_page::LeafNode;
    use crate::storage::DiskManager;
    use tempfile::tempdir;

    type Internal<'a> = InternalNode<&'a mut [u8], i64>;

    fn keys(buf: &[u8]) -> Vec<i64> {
        let node = InternalNode::<_, i64>::new(buf);
        (1..node.size()).map(|i| node.key_at(i)).collect()
    }

    fn children(buf: &[u8]) -> Vec<u32> {
        let node = InternalNode::<_, i64>::new(buf);
        node.children().into_iter().map(|p| p.0).collect()
    }

    /// Internal node `page_id` with children `first, (k, k+100)...`.
    fn internal_with(buf: &mut [u8], page_id: u32, first: u32, keys: &[i64]) {
        let mut node = Internal::new(buf);
        node.init(PageId::new(page_id), PageId::INVALID, 8);
        node.populate_new_root(PageId::new(first), &keys[0], PageId::new(keys[0] as u32 + 100));
        for &k in &keys[1..] {
            let prev = node.value_at(node.size() - 1);
            node.insert_node_after(prev, &k, PageId::new(k as u32 + 100))
                .unwrap();
        }
    }

    /// Pool with leaf pages registered for every child id used below.
    fn pool_with_children(ids: &[u32]) -> (tempfile::TempDir, BufferPoolManager) {
        let dir = tempdir().unwrap();
        let dm = DiskManager::create(dir.path().join("internal.db")).unwrap();
        let bpm = BufferPoolManager::new(8, 2, dm).unwrap();
        let max = ids.iter().copied().max().unwrap_or(0);
        for id in 0..=max {
            let mut guard = bpm.new_page().unwrap();
            assert_eq!(guard.page_id(), PageId::new(id));
            LeafNode::<_, i64, i64>::new(guard.as_mut_slice()).init(
                PageId::new(id),
                PageId::new(999),
                4,
            );
        }
        (dir, bpm)
    }

    fn parent_of(bpm: &BufferPoolManager, id: u32) -> PageId {
        let guard = bpm.fetch_page_read(PageId::new(id)).unwrap();
        TreePage::new(guard.as_slice()).parent_page_id()
    }

    #[test]
    fn test_lookup_picks_child_by_upper_bound() {
        let mut buf = vec![0u8; PAGE_SIZE];
        internal_with(&mut buf, 1, 10, &[5, 9]);
        let node = InternalNode::<_, i64>::new(buf.as_slice());

        assert_eq!(node.lookup(&i64::MIN), PageId::new(10));
        assert_eq!(node.lookup(&4), PageId::new(10));
        assert_eq!(node.lookup(&5), PageId::new(105));
        assert_eq!(node.lookup(&8), PageId::new(105));
        assert_eq!(node.lookup(&9), PageId::new(109));
        assert_eq!(node.lookup(&100), PageId::new(109));
        assert_eq!(node.value_index(PageId::new(105)), Some(1));
        assert_eq!(node.value_index(PageId::new(7)), None);
    }

    #[test]
    fn test_insert_node_after_and_remove() {
        let mut buf = vec![0u8; PAGE_SIZE];
        internal_with(&mut buf, 1, 10, &[5, 9]);
        {
            let mut node = Internal::new(buf.as_mut_slice());
            assert_eq!(
                node.insert_node_after(PageId::new(105), &7, PageId::new(107))
                    .unwrap(),
                4
            );
            assert!(node
                .insert_node_after(PageId::new(55), &1, PageId::new(1))
                .is_err());
        }
        assert_eq!(keys(&buf), vec![5, 7, 9]);
        assert_eq!(children(&buf), vec![10, 105, 107, 109]);

        Internal::new(buf.as_mut_slice()).remove(1);
        assert_eq!(children(&buf), vec![10, 107, 109]);
    }

    #[test]
    fn test_remove_and_return_only_child() {
        let mut buf = vec![0u8; PAGE_SIZE];
        internal_with(&mut buf, 1, 10, &[5]);
        let mut node = Internal::new(buf.as_mut_slice());
        node.remove(1);
        assert_eq!(node.remove_and_return_only_child(), PageId::new(10));
        assert_eq!(node.size(), 0);
    }

    #[test]
    fn test_move_half_to_reparents() {
        let (_dir, bpm) = pool_with_children(&[0, 1, 2, 3, 4, 5]);
        let mut left = vec![0u8; PAGE_SIZE];
        let mut right = vec![0u8; PAGE_SIZE];
        {
            let mut l = Internal::new(left.as_mut_slice());
            l.init(PageId::new(20), PageId::INVALID, 4);
            l.populate_new_root(PageId::new(1), &10, PageId::new(2));
            l.insert_node_after(PageId::new(2), &20, PageId::new(3)).unwrap();
            l.insert_node_after(PageId::new(3), &30, PageId::new(4)).unwrap();
            l.insert_node_after(PageId::new(4), &40, PageId::new(5)).unwrap();
            let mut r = Internal::new(right.as_mut_slice());
            r.init(PageId::new(21), PageId::INVALID, 4);

            l.move_half_to(&mut r, &bpm).unwrap();
            assert_eq!(r.key_at(0), 30);
        }
        assert_eq!(children(&left), vec![1, 2, 3]);
        assert_eq!(children(&right), vec![4, 5]);
        assert_eq!(keys(&left), vec![10, 20]);
        assert_eq!(keys(&right), vec![40]);
        assert_eq!(parent_of(&bpm, 4), PageId::new(21));
        assert_eq!(parent_of(&bpm, 5), PageId::new(21));
        assert_eq!(parent_of(&bpm, 1), PageId::new(999));
    }

    #[test]
    fn test_move_all_to_pulls_down_middle_key() {
        let (_dir, bpm) = pool_with_children(&[0, 1, 2, 3, 4]);
        let mut left = vec![0u8; PAGE_SIZE];
        let mut right = vec![0u8; PAGE_SIZE];
        {
            let mut l = Internal::new(left.as_mut_slice());
            l.init(PageId::new(20), PageId::new(30), 4);
            l.populate_new_root(PageId::new(1), &10, PageId::new(2));
            let mut r = Internal::new(right.as_mut_slice());
            r.init(PageId::new(21), PageId::new(30), 4);
            r.populate_new_root(PageId::new(3), &60, PageId::new(4));

            r.move_all_to(&mut l, &50, &bpm).unwrap();
            assert_eq!(r.size(), 0);
        }
        assert_eq!(children(&left), vec![1, 2, 3, 4]);
        assert_eq!(keys(&left), vec![10, 50, 60]);
        assert_eq!(parent_of(&bpm, 3), PageId::new(20));
        assert_eq!(parent_of(&bpm, 4), PageId::new(20));
    }

    #[test]
    fn test_redistribute_moves() {
        let (_dir, bpm) = pool_with_children(&[0, 1, 2, 3, 4, 5]);
        let mut left = vec![0u8; PAGE_SIZE];
        let mut right = vec![0u8; PAGE_SIZE];
        {
            let mut l = Internal::new(left.as_mut_slice());
            l.init(PageId::new(20), PageId::new(30), 4);
            l.populate_new_root(PageId::new(1), &10, PageId::new(2));
            l.insert_node_after(PageId::new(2), &20, PageId::new(3)).unwrap();
            let mut r = Internal::new(right.as_mut_slice());
            r.init(PageId::new(21), PageId::new(30), 4);
            r.populate_new_root(PageId::new(4), &60, PageId::new(5));

            // Separator between the two is 50.
            l.move_last_to_front_of(&mut r, &50, &bpm).unwrap();
            assert_eq!(r.key_at(0), 20);
        }
        assert_eq!(children(&left), vec![1, 2]);
        assert_eq!(children(&right), vec![3, 4, 5]);
        assert_eq!(keys(&right), vec![50, 60]);
        assert_eq!(parent_of(&bpm, 3), PageId::new(21));

        {
            let mut l = Internal::new(left.as_mut_slice());
            let mut r = Internal::new(right.as_mut_slice());
            // Separator is now 20.
            r.move_first_to_end_of(&mut l, &20, &bpm).unwrap();
            assert_eq!(r.key_at(0), 50);
        }
        assert_eq!(children(&left), vec![1, 2, 3]);
        assert_eq!(keys(&left), vec![10, 20]);
        assert_eq!(children(&right), vec![4, 5]);
        assert_eq!(keys(&right), vec![60]);
        assert_eq!(parent_of(&bpm, 3), PageId::new(20));
    }
}
