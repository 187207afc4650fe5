//! Forward iteration over the leaf chain.

use std::marker::PhantomData;

use crate::buffer::{BufferPoolManager, PageGuard};
use crate::common::{Error, PageId, Result};

use super::codec::Storable;
use super::leaf_page::LeafNode;
use super::node::TreePage;

/// Cursor over `(key, value)` pairs in ascending key order.
///
/// Holds a pin on exactly one leaf and latches it only while copying a
/// slot out, so writers are not blocked between steps. Moving to the next
/// leaf unpins the current one first. Structural changes made while the
/// iterator is live may be observed partially.
///
/// Once exhausted the cursor rests on the last leaf at one past its final
/// slot, which is the position [`BPlusTree::end`](super::BPlusTree::end)
/// reports.
pub struct TreeIter<'a, K, V> {
    bpm: &'a BufferPoolManager,
    leaf: Option<PageGuard<'a>>,
    index: usize,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<'a, K, V> TreeIter<'a, K, V>
where
    K: Storable + Ord,
    V: Storable,
{
    pub(crate) fn new(bpm: &'a BufferPoolManager, leaf: Option<PageGuard<'a>>, index: usize) -> Self {
        Self {
            bpm,
            leaf,
            index,
            _marker: PhantomData,
        }
    }

    /// Leaf page and slot the cursor points at. `None` for an empty tree.
    pub fn position(&self) -> Option<(PageId, usize)> {
        self.leaf.as_ref().map(|leaf| (leaf.page_id(), self.index))
    }

    /// Whether no entries remain.
    pub fn is_end(&self) -> bool {
        let Some(leaf) = &self.leaf else {
            return true;
        };
        let page = leaf.read();
        let node = LeafNode::<_, K, V>::new(page.as_slice());
        self.index >= node.size() && !node.next_page_id().is_valid()
    }

    fn pin_leaf(&self, page_id: PageId) -> Result<PageGuard<'a>> {
        let guard = self.bpm.fetch_page_basic(page_id)?;
        {
            let page = guard.read();
            let node = TreePage::new(page.as_slice());
            node.validate(page_id)?;
            if !node.is_leaf() {
                return Err(Error::corrupted(page_id.0, "leaf chain points at an internal node"));
            }
        }
        Ok(guard)
    }
}

impl<K, V> Iterator for TreeIter<'_, K, V>
where
    K: Storable + Ord,
    V: Storable,
{
    type Item = Result<(K, V)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let leaf = self.leaf.as_ref()?;
            let next_id = {
                let page = leaf.read();
                let node = LeafNode::<_, K, V>::new(page.as_slice());
                if self.index < node.size() {
                    let item = node.item(self.index);
                    self.index += 1;
                    return Some(Ok(item));
                }
                node.next_page_id()
            };
            if !next_id.is_valid() {
                return None;
            }

            // Unpin before pinning the next leaf.
            self.leaf = None;
            match self.pin_leaf(next_id) {
                Ok(guard) => {
                    self.leaf = Some(guard);
                    self.index = 0;
                }
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

impl<K, V> PartialEq for TreeIter<'_, K, V>
where
    K: Storable + Ord,
    V: Storable,
{
    fn eq(&self, other: &Self) -> bool {
        self.position() == other.position()
    }
}
