//! Leaf node page.

use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};

use crate::common::config::PAGE_SIZE;
use crate::common::PageId;
use crate::storage::page::{read_u32, write_u32, PageType};

use super::codec::Storable;
use super::node::{TreePage, NODE_HEADER_SIZE, OFFSET_NEXT};

/// Typed view of a leaf: sorted, unique `(key, value)` pairs plus the id of
/// the next leaf in key order.
///
/// ```text
/// | node header | K0 V0 | K1 V1 | ... | K(size-1) V(size-1) | free |
/// ```
pub struct LeafNode<B, K, V> {
    page: TreePage<B>,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<B, K, V> Deref for LeafNode<B, K, V> {
    type Target = TreePage<B>;

    fn deref(&self) -> &TreePage<B> {
        &self.page
    }
}

impl<B, K, V> DerefMut for LeafNode<B, K, V> {
    fn deref_mut(&mut self) -> &mut TreePage<B> {
        &mut self.page
    }
}

impl<B, K: Storable, V: Storable> LeafNode<B, K, V> {
    pub const ENTRY_SIZE: usize = K::ENCODED_LEN + V::ENCODED_LEN;

    /// Entries that physically fit in one page.
    pub const CAPACITY: usize = (PAGE_SIZE - NODE_HEADER_SIZE) / Self::ENTRY_SIZE;

    #[inline]
    fn offset(index: usize) -> usize {
        NODE_HEADER_SIZE + index * Self::ENTRY_SIZE
    }
}

impl<B: AsRef<[u8]>, K: Storable + Ord, V: Storable> LeafNode<B, K, V> {
    pub fn new(data: B) -> Self {
        Self {
            page: TreePage::new(data),
            _marker: PhantomData,
        }
    }

    pub fn next_page_id(&self) -> PageId {
        PageId(read_u32(self.bytes(), OFFSET_NEXT))
    }

    pub fn key_at(&self, index: usize) -> K {
        K::decode(&self.bytes()[Self::offset(index)..])
    }

    pub fn value_at(&self, index: usize) -> V {
        V::decode(&self.bytes()[Self::offset(index) + K::ENCODED_LEN..])
    }

    pub fn item(&self, index: usize) -> (K, V) {
        (self.key_at(index), self.value_at(index))
    }

    /// First slot whose key is `>= key` (may be `size()`).
    pub fn key_index(&self, key: &K) -> usize {
        let (mut lo, mut hi) = (0, self.size());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.key_at(mid) < *key {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    pub fn lookup(&self, key: &K) -> Option<V> {
        let index = self.key_index(key);
        (index < self.size() && self.key_at(index) == *key).then(|| self.value_at(index))
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>, K: Storable + Ord, V: Storable> LeafNode<B, K, V> {
    /// Format an empty leaf.
    pub fn init(&mut self, page_id: PageId, parent_id: PageId, max_size: usize) {
        debug_assert!(max_size <= Self::CAPACITY);
        self.page
            .init(PageType::BTreeLeaf, page_id, parent_id, max_size);
    }

    pub fn set_next_page_id(&mut self, next: PageId) {
        write_u32(self.bytes_mut(), OFFSET_NEXT, next.0);
    }

    fn write_entry(&mut self, index: usize, key: &K, value: &V) {
        let off = Self::offset(index);
        let bytes = self.bytes_mut();
        key.encode(&mut bytes[off..off + K::ENCODED_LEN]);
        value.encode(&mut bytes[off + K::ENCODED_LEN..off + Self::ENTRY_SIZE]);
    }

    /// Shift entries `[from, size)` by `delta` slots (positive = right).
    fn shift(&mut self, from: usize, delta: isize) {
        let size = self.size();
        let src = Self::offset(from)..Self::offset(size);
        let dest = (Self::offset(from) as isize + delta * Self::ENTRY_SIZE as isize) as usize;
        self.bytes_mut().copy_within(src, dest);
    }

    /// Insert in key order. Returns the size afterwards, unchanged if the key
    /// was already present.
    pub fn insert(&mut self, key: &K, value: &V) -> usize {
        let size = self.size();
        let index = self.key_index(key);
        if index < size && self.key_at(index) == *key {
            return size;
        }
        debug_assert!(size < Self::CAPACITY, "leaf overflow");

        self.shift(index, 1);
        self.write_entry(index, key, value);
        self.set_size(size + 1);
        size + 1
    }

    /// Remove `key`. Returns the size afterwards, unchanged if absent.
    pub fn remove(&mut self, key: &K) -> usize {
        let size = self.size();
        let index = self.key_index(key);
        if index >= size || self.key_at(index) != *key {
            return size;
        }

        self.shift(index + 1, -1);
        self.set_size(size - 1);
        size - 1
    }

    fn append_from<C: AsRef<[u8]>>(&mut self, src: &LeafNode<C, K, V>, range: std::ops::Range<usize>) {
        let size = self.size();
        let count = range.len();
        let from = Self::offset(range.start)..Self::offset(range.end);
        let to = Self::offset(size);
        self.bytes_mut()[to..to + from.len()].copy_from_slice(&src.bytes()[from]);
        self.set_size(size + count);
    }

    /// Split: move the upper half into the empty `recipient`.
    ///
    /// The leaf chain is not touched; the caller splices `recipient` in.
    pub fn move_half_to<C>(&mut self, recipient: &mut LeafNode<C, K, V>)
    where
        C: AsRef<[u8]> + AsMut<[u8]>,
    {
        let size = self.size();
        let keep = size - size / 2;
        recipient.append_from(self, keep..size);
        self.set_size(keep);
    }

    /// Merge: append every entry to `recipient` (the left neighbour) and
    /// hand over the next-leaf link.
    pub fn move_all_to<C>(&mut self, recipient: &mut LeafNode<C, K, V>)
    where
        C: AsRef<[u8]> + AsMut<[u8]>,
    {
        let size = self.size();
        recipient.append_from(self, 0..size);
        recipient.set_next_page_id(self.next_page_id());
        self.set_size(0);
    }

    /// Redistribute: move the first entry to the end of `recipient`.
    pub fn move_first_to_end_of<C>(&mut self, recipient: &mut LeafNode<C, K, V>)
    where
        C: AsRef<[u8]> + AsMut<[u8]>,
    {
        let (key, value) = self.item(0);
        let size = self.size();
        self.shift(1, -1);
        self.set_size(size - 1);

        let at = recipient.size();
        recipient.write_entry(at, &key, &value);
        recipient.set_size(at + 1);
    }

    /// Redistribute: move the last entry to the front of `recipient`.
    pub fn move_last_to_front_of<C>(&mut self, recipient: &mut LeafNode<C, K, V>)
    where
        C: AsRef<[u8]> + AsMut<[u8]>,
    {
        let size = self.size();
        let (key, value) = self.item(size - 1);
        self.set_size(size - 1);

        let recipient_size = recipient.size();
        recipient.shift(0, 1);
        recipient.write_entry(0, &key, &value);
        recipient.set_size(recipient_size + 1);
    }
}
