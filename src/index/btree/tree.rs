//! Concurrent B+Tree over the buffer pool.

use std::collections::VecDeque;
use std::fmt::{self, Write as _};
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::buffer::{BufferPoolManager, PageReadGuard, PageWriteGuard};
use crate::common::{Error, PageId, Result};
use crate::storage::page::{check_index_name, HeaderPage, PageType, HEADER_PAGE_ID};

use super::codec::Storable;
use super::context::Context;
use super::internal_page::{adopt, InternalNode};
use super::iterator::TreeIter;
use super::leaf_page::LeafNode;
use super::node::{Operation, TreePage};

/// Node fan-out limits.
///
/// A leaf splits as soon as it holds `leaf_max_size` entries. An internal
/// node splits once it holds more than `internal_max_size` children, so a
/// page must have room for `internal_max_size + 1` of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BTreeOptions {
    pub leaf_max_size: usize,
    pub internal_max_size: usize,
}

impl BTreeOptions {
    pub fn new(leaf_max_size: usize, internal_max_size: usize) -> Self {
        Self {
            leaf_max_size,
            internal_max_size,
        }
    }

    /// Largest fan-out a 4KB page allows for these key and value types.
    pub fn max_for<K: Storable, V: Storable>() -> Self {
        Self {
            leaf_max_size: LeafNode::<&[u8], K, V>::CAPACITY,
            internal_max_size: InternalNode::<&[u8], K>::CAPACITY - 1,
        }
    }

    /// # Errors
    /// `Error::InvalidConfig` if a limit is too small to split or does not
    /// fit in a page.
    pub fn validate<K: Storable, V: Storable>(&self) -> Result<()> {
        let max = Self::max_for::<K, V>();
        if !(2..=max.leaf_max_size).contains(&self.leaf_max_size) {
            return Err(Error::InvalidConfig(format!(
                "leaf_max_size must be in 2..={}, got {}",
                max.leaf_max_size, self.leaf_max_size
            )));
        }
        if !(3..=max.internal_max_size).contains(&self.internal_max_size) {
            return Err(Error::InvalidConfig(format!(
                "internal_max_size must be in 3..={}, got {}",
                max.internal_max_size, self.internal_max_size
            )));
        }
        Ok(())
    }
}

/// Which leaf a read-only descent should end at.
pub(crate) enum Target<'k, K> {
    Leftmost,
    Key(&'k K),
    Rightmost,
}

/// Ordered map from unique `K` to `V`, stored in buffer pool pages.
///
/// Lookups crab down with shared latches. Inserts and removes crab down
/// with exclusive latches and keep every ancestor latched until they reach
/// a node the operation cannot restructure. The tree-wide `root` lock
/// guards root replacement and is held the same way.
///
/// The root page id is persisted on the header page under `name`, so
/// opening a tree with the same name on the same file resumes it.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use pagedb::{BPlusTree, BTreeOptions, BufferPoolManager, DiskManager};
///
/// let dm = DiskManager::create("index.db")?;
/// let bpm = Arc::new(BufferPoolManager::new(64, 2, dm)?);
/// let tree: BPlusTree<i64, i64> =
///     BPlusTree::new("orders_pk", bpm, BTreeOptions::max_for::<i64, i64>())?;
///
/// tree.insert(&42, &4200)?;
/// assert_eq!(tree.get(&42)?, Some(4200));
/// # Ok::<(), pagedb::Error>(())
/// ```
pub struct BPlusTree<K, V> {
    name: String,
    bpm: Arc<BufferPoolManager>,
    root: RwLock<PageId>,
    options: BTreeOptions,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> BPlusTree<K, V>
where
    K: Storable + Ord,
    V: Storable,
{
    /// Open the tree called `name`, creating the header page if the file
    /// has none yet.
    ///
    /// # Errors
    /// - `Error::InvalidConfig` for a bad name or fan-out
    /// - `Error::Corrupted` if page 0 is not a valid header page
    pub fn new(name: &str, bpm: Arc<BufferPoolManager>, options: BTreeOptions) -> Result<Self> {
        check_index_name(name)?;
        options.validate::<K, V>()?;

        let root = Self::load_root(&bpm, name)?;
        debug!(tree = name, %root, "opened tree");

        Ok(Self {
            name: name.to_string(),
            bpm,
            root: RwLock::new(root),
            options,
            _marker: PhantomData,
        })
    }

    fn load_root(bpm: &BufferPoolManager, name: &str) -> Result<PageId> {
        let mut guard = match bpm.fetch_page_write(HEADER_PAGE_ID) {
            Ok(guard) => guard,
            Err(Error::PageNotFound(_)) => {
                let guard = bpm.new_page()?;
                if guard.page_id() != HEADER_PAGE_ID {
                    return Err(Error::corrupted(
                        HEADER_PAGE_ID.0,
                        format!("header page allocated as {}", guard.page_id()),
                    ));
                }
                guard
            }
            Err(err) => return Err(err),
        };

        let page_type = guard.page_type();
        let mut header = HeaderPage::new(guard.as_mut_slice());
        match page_type {
            PageType::Invalid => header.init(),
            _ => header.validate()?,
        }
        Ok(header.get_root_id(name).unwrap_or(PageId::INVALID))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> BTreeOptions {
        self.options
    }

    pub fn is_empty(&self) -> bool {
        !self.root.read().is_valid()
    }

    pub fn root_page_id(&self) -> PageId {
        *self.root.read()
    }

    pub(crate) fn bpm(&self) -> &BufferPoolManager {
        &self.bpm
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// Value stored under `key`.
    pub fn get(&self, key: &K) -> Result<Option<V>> {
        let Some(guard) = self.find_leaf_read(Target::Key(key))? else {
            return Ok(None);
        };
        Ok(LeafNode::<_, K, V>::new(guard.as_slice()).lookup(key))
    }

    /// Crab down to a leaf with shared latches.
    pub(crate) fn find_leaf_read(&self, target: Target<'_, K>) -> Result<Option<PageReadGuard<'_>>> {
        let root = self.root.read();
        if !root.is_valid() {
            return Ok(None);
        }
        let mut guard = self.fetch_read(*root)?;
        drop(root);

        loop {
            let child = {
                if TreePage::new(guard.as_slice()).is_leaf() {
                    return Ok(Some(guard));
                }
                let node = InternalNode::<_, K>::new(guard.as_slice());
                match target {
                    Target::Leftmost => node.value_at(0),
                    Target::Key(key) => node.lookup(key),
                    Target::Rightmost => node.value_at(node.size() - 1),
                }
            };
            // The child is latched before the parent is released.
            guard = self.fetch_read(child)?;
        }
    }

    // ========================================================================
    // Iteration
    // ========================================================================

    /// Iterator positioned at the smallest key.
    pub fn iter(&self) -> Result<TreeIter<'_, K, V>> {
        let leaf = self.find_leaf_read(Target::Leftmost)?;
        Ok(TreeIter::new(self.bpm(), leaf.map(|g| g.into_basic()), 0))
    }

    /// Iterator positioned at the first key `>= key`.
    pub fn iter_from(&self, key: &K) -> Result<TreeIter<'_, K, V>> {
        let Some(leaf) = self.find_leaf_read(Target::Key(key))? else {
            return Ok(TreeIter::new(self.bpm(), None, 0));
        };
        let index = LeafNode::<_, K, V>::new(leaf.as_slice()).key_index(key);
        Ok(TreeIter::new(self.bpm(), Some(leaf.into_basic()), index))
    }

    /// Iterator positioned one past the largest key.
    pub fn end(&self) -> Result<TreeIter<'_, K, V>> {
        let Some(leaf) = self.find_leaf_read(Target::Rightmost)? else {
            return Ok(TreeIter::new(self.bpm(), None, 0));
        };
        let size = TreePage::new(leaf.as_slice()).size();
        Ok(TreeIter::new(self.bpm(), Some(leaf.into_basic()), size))
    }

    // ========================================================================
    // Insert
    // ========================================================================

    /// Insert `key -> value`. Returns `false`, changing nothing, if `key`
    /// is already present.
    ///
    /// # Errors
    /// `Error::NoFreeFrames` if a split cannot get a page. The tree is left
    /// in an unspecified state.
    pub fn insert(&self, key: &K, value: &V) -> Result<bool> {
        let mut ctx = Context::new(self.root.write());
        let result = self.insert_with(&mut ctx, key, value);
        ctx.finish(&self.bpm);
        result
    }

    fn insert_with<'a>(&'a self, ctx: &mut Context<'a>, key: &K, value: &V) -> Result<bool> {
        if !ctx.root_id().is_some_and(|root| root.is_valid()) {
            self.start_new_tree(ctx, key, value)?;
            return Ok(true);
        }

        self.descend_write(ctx, key, Operation::Insert)?;
        let mut leaf_guard = self.pop_latched(ctx)?;
        let mut leaf = LeafNode::<_, K, V>::new(leaf_guard.as_mut_slice());

        let before = leaf.size();
        let size = leaf.insert(key, value);
        if size == before {
            return Ok(false);
        }
        if size < leaf.max_size() {
            return Ok(true);
        }

        let mut sibling_guard = self.bpm.new_page()?;
        let sibling_id = sibling_guard.page_id();
        let mut sibling = LeafNode::<_, K, V>::new(sibling_guard.as_mut_slice());
        sibling.init(sibling_id, leaf.parent_page_id(), self.options.leaf_max_size);
        leaf.move_half_to(&mut sibling);
        sibling.set_next_page_id(leaf.next_page_id());
        leaf.set_next_page_id(sibling_id);

        let leaf_id = leaf.page_id();
        let separator = sibling.key_at(0);
        drop(sibling_guard);
        drop(leaf_guard);
        debug!(tree = %self.name, leaf = %leaf_id, sibling = %sibling_id, "split leaf");

        self.insert_into_parent(ctx, leaf_id, &separator, sibling_id)?;
        Ok(true)
    }

    fn start_new_tree(&self, ctx: &mut Context<'_>, key: &K, value: &V) -> Result<()> {
        let mut guard = self.bpm.new_page()?;
        let root_id = guard.page_id();
        let mut leaf = LeafNode::<_, K, V>::new(guard.as_mut_slice());
        leaf.init(root_id, PageId::INVALID, self.options.leaf_max_size);
        leaf.insert(key, value);
        drop(guard);

        self.set_root(ctx, root_id)
    }

    /// Hook the freshly split `right` in next to `left` in their parent,
    /// splitting upwards as needed. Both children must be unlatched.
    fn insert_into_parent<'a>(
        &'a self,
        ctx: &mut Context<'a>,
        left: PageId,
        key: &K,
        right: PageId,
    ) -> Result<()> {
        let Some(mut parent_guard) = ctx.write_set.pop_back() else {
            // `left` was the root.
            let mut root_guard = self.bpm.new_page()?;
            let root_id = root_guard.page_id();
            let mut root = InternalNode::<_, K>::new(root_guard.as_mut_slice());
            root.init(root_id, PageId::INVALID, self.options.internal_max_size);
            root.populate_new_root(left, key, right);
            drop(root_guard);

            adopt(&self.bpm, left, root_id)?;
            adopt(&self.bpm, right, root_id)?;
            return self.set_root(ctx, root_id);
        };

        let mut parent = InternalNode::<_, K>::new(parent_guard.as_mut_slice());
        if parent.insert_node_after(left, key, right)? <= parent.max_size() {
            return Ok(());
        }

        let mut sibling_guard = self.bpm.new_page()?;
        let sibling_id = sibling_guard.page_id();
        let mut sibling = InternalNode::<_, K>::new(sibling_guard.as_mut_slice());
        sibling.init(sibling_id, parent.parent_page_id(), self.options.internal_max_size);
        parent.move_half_to(&mut sibling, &self.bpm)?;

        let parent_id = parent.page_id();
        let separator = sibling.key_at(0);
        drop(sibling_guard);
        drop(parent_guard);
        debug!(tree = %self.name, node = %parent_id, sibling = %sibling_id, "split internal");

        self.insert_into_parent(ctx, parent_id, &separator, sibling_id)
    }

    // ========================================================================
    // Remove
    // ========================================================================

    /// Remove `key`. Returns `false` if it was not present.
    pub fn remove(&self, key: &K) -> Result<bool> {
        let mut ctx = Context::new(self.root.write());
        let result = self.remove_with(&mut ctx, key);
        ctx.finish(&self.bpm);
        result
    }

    fn remove_with<'a>(&'a self, ctx: &mut Context<'a>, key: &K) -> Result<bool> {
        if !ctx.root_id().is_some_and(|root| root.is_valid()) {
            return Ok(false);
        }

        self.descend_write(ctx, key, Operation::Remove)?;
        let mut leaf_guard = self.pop_latched(ctx)?;
        let mut leaf = LeafNode::<_, K, V>::new(leaf_guard.as_mut_slice());
        let before = leaf.size();
        if leaf.remove(key) == before {
            return Ok(false);
        }

        self.rebalance(ctx, leaf_guard)?;
        Ok(true)
    }

    /// Restore the size bounds of `guard`'s node after it lost an entry.
    ///
    /// Merges with or borrows from a sibling, recursing into the parent
    /// when a merge leaves it short.
    fn rebalance<'a>(&'a self, ctx: &mut Context<'a>, mut guard: PageWriteGuard<'a>) -> Result<()> {
        let node = TreePage::new(guard.as_slice());
        if node.is_root() {
            return self.adjust_root(ctx, guard);
        }
        if node.size() >= node.min_size() {
            return Ok(());
        }
        let is_leaf = node.is_leaf();
        let max_size = node.max_size();
        let node_size = node.size();
        let node_id = guard.page_id();

        let mut parent_guard = self.pop_latched(ctx)?;
        let mut parent = InternalNode::<_, K>::new(parent_guard.as_mut_slice());
        let index = parent.value_index(node_id).ok_or_else(|| {
            Error::TreeInvariant(format!("{} is not a child of {}", node_id, parent.page_id()))
        })?;

        // Prefer the left neighbour. The leftmost child pairs with its right one.
        let node_is_left = index == 0;
        let sibling_id = parent.value_at(if node_is_left { 1 } else { index - 1 });
        let right_index = if node_is_left { 1 } else { index };
        let middle_key = parent.key_at(right_index);

        let mut sibling_guard = self.fetch_write(sibling_id)?;
        let sibling_size = TreePage::new(sibling_guard.as_slice()).size();
        let (left, right) = if node_is_left {
            (&mut guard, &mut sibling_guard)
        } else {
            (&mut sibling_guard, &mut guard)
        };

        let total = node_size + sibling_size;
        let fits = if is_leaf { total < max_size } else { total <= max_size };

        if fits {
            let right_id = right.page_id();
            if is_leaf {
                LeafNode::<_, K, V>::new(right.as_mut_slice())
                    .move_all_to(&mut LeafNode::new(left.as_mut_slice()));
            } else {
                InternalNode::<_, K>::new(right.as_mut_slice()).move_all_to(
                    &mut InternalNode::new(left.as_mut_slice()),
                    &middle_key,
                    &self.bpm,
                )?;
            }
            parent.remove(right_index);
            ctx.schedule_delete(right_id);

            drop(sibling_guard);
            drop(guard);
            debug!(tree = %self.name, node = %node_id, sibling = %sibling_id, "coalesced");
            return self.rebalance(ctx, parent_guard);
        }

        let separator = if is_leaf {
            let mut l = LeafNode::<_, K, V>::new(left.as_mut_slice());
            let mut r = LeafNode::<_, K, V>::new(right.as_mut_slice());
            if node_is_left {
                r.move_first_to_end_of(&mut l);
            } else {
                l.move_last_to_front_of(&mut r);
            }
            r.key_at(0)
        } else {
            let mut l = InternalNode::<_, K>::new(left.as_mut_slice());
            let mut r = InternalNode::<_, K>::new(right.as_mut_slice());
            if node_is_left {
                r.move_first_to_end_of(&mut l, &middle_key, &self.bpm)?;
            } else {
                l.move_last_to_front_of(&mut r, &middle_key, &self.bpm)?;
            }
            r.key_at(0)
        };
        parent.set_key_at(right_index, &separator);
        debug!(tree = %self.name, node = %node_id, sibling = %sibling_id, "redistributed");
        Ok(())
    }

    /// Shrink the tree at the root: an empty leaf root empties the tree, an
    /// internal root with one child hands the root over to that child.
    fn adjust_root(&self, ctx: &mut Context<'_>, mut guard: PageWriteGuard<'_>) -> Result<()> {
        let old_root = guard.page_id();
        let node = TreePage::new(guard.as_slice());

        let new_root = if node.is_leaf() {
            if node.size() > 0 {
                return Ok(());
            }
            PageId::INVALID
        } else {
            if node.size() > 1 {
                return Ok(());
            }
            InternalNode::<_, K>::new(guard.as_mut_slice()).remove_and_return_only_child()
        };
        drop(guard);

        if new_root.is_valid() {
            adopt(&self.bpm, new_root, PageId::INVALID)?;
        }
        ctx.schedule_delete(old_root);
        self.set_root(ctx, new_root)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Crab down to the leaf for `key` with exclusive latches, releasing
    /// everything above each node that is safe for `op`. Latched pages end
    /// up in `ctx.write_set`, the leaf last.
    fn descend_write<'a>(&'a self, ctx: &mut Context<'a>, key: &K, op: Operation) -> Result<()> {
        let mut page_id = ctx
            .root_id()
            .ok_or_else(|| Error::TreeInvariant("descent without the root lock".into()))?;

        loop {
            let guard = self.fetch_write(page_id)?;
            let node = TreePage::new(guard.as_slice());
            let child = (!node.is_leaf())
                .then(|| InternalNode::<_, K>::new(guard.as_slice()).lookup(key));
            if node.is_safe(op) {
                ctx.release_ancestors();
            }
            trace!(page = %page_id, held = ctx.write_set.len(), root_locked = ctx.holds_root(), "latched");
            ctx.write_set.push_back(guard);

            match child {
                Some(child) => page_id = child,
                None => return Ok(()),
            }
        }
    }

    fn pop_latched<'a>(&self, ctx: &mut Context<'a>) -> Result<PageWriteGuard<'a>> {
        ctx.write_set
            .pop_back()
            .ok_or_else(|| Error::TreeInvariant("expected a latched page".into()))
    }

    fn fetch_read(&self, page_id: PageId) -> Result<PageReadGuard<'_>> {
        let guard = self.bpm.fetch_page_read(page_id)?;
        TreePage::new(guard.as_slice()).validate(page_id)?;
        Ok(guard)
    }

    fn fetch_write(&self, page_id: PageId) -> Result<PageWriteGuard<'_>> {
        let guard = self.bpm.fetch_page_write(page_id)?;
        TreePage::new(guard.as_slice()).validate(page_id)?;
        Ok(guard)
    }

    /// Swap the root in memory and on the header page.
    fn set_root(&self, ctx: &mut Context<'_>, root: PageId) -> Result<()> {
        ctx.set_root(root)?;
        self.update_root(root)?;
        debug!(tree = %self.name, %root, "root changed");
        Ok(())
    }

    fn update_root(&self, root: PageId) -> Result<()> {
        let mut guard = self.bpm.fetch_page_write(HEADER_PAGE_ID)?;
        HeaderPage::new(guard.as_mut_slice()).insert_or_update(&self.name, root)
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    /// Owned copy of one node, read under a short shared latch.
    fn snapshot(&self, page_id: PageId) -> Result<NodeSnapshot<K>> {
        let guard = self.fetch_read(page_id)?;
        let node = TreePage::new(guard.as_slice());

        let snapshot = if node.is_leaf() {
            let leaf = LeafNode::<_, K, V>::new(guard.as_slice());
            NodeSnapshot {
                parent: node.parent_page_id(),
                is_leaf: true,
                max_size: node.max_size(),
                min_size: node.min_size(),
                keys: (0..leaf.size()).map(|i| leaf.key_at(i)).collect(),
                children: Vec::new(),
                next: leaf.next_page_id(),
            }
        } else {
            let internal = InternalNode::<_, K>::new(guard.as_slice());
            NodeSnapshot {
                parent: node.parent_page_id(),
                is_leaf: false,
                max_size: node.max_size(),
                min_size: node.min_size(),
                keys: (1..internal.size()).map(|i| internal.key_at(i)).collect(),
                children: internal.children(),
                next: PageId::INVALID,
            }
        };
        Ok(snapshot)
    }

    /// Walk the whole tree and verify its structure: parent links, size
    /// bounds, key order, separator bounds, uniform leaf depth and the leaf
    /// chain. Meant for a tree no one is writing to.
    ///
    /// # Errors
    /// `Error::TreeInvariant` describing the first violation found.
    pub fn check_integrity(&self) -> Result<()> {
        let root = self.root_page_id();
        if !root.is_valid() {
            return Ok(());
        }

        let mut walk = Walk {
            leaf_depth: None,
            leaves: Vec::new(),
        };
        self.check_node(root, PageId::INVALID, None, None, 0, &mut walk)?;

        let mut expected = walk.leaves.iter();
        let mut current = walk.leaves.first().copied();
        while let Some(page_id) = current {
            if expected.next() != Some(&page_id) {
                return Err(invariant(format!("leaf chain reaches {} out of order", page_id)));
            }
            let next = self.snapshot(page_id)?.next;
            current = next.is_valid().then_some(next);
        }
        if expected.next().is_some() {
            return Err(invariant("leaf chain ends early".to_string()));
        }
        Ok(())
    }

    fn check_node(
        &self,
        page_id: PageId,
        parent: PageId,
        lower: Option<&K>,
        upper: Option<&K>,
        depth: usize,
        walk: &mut Walk,
    ) -> Result<()> {
        let node = self.snapshot(page_id)?;
        if node.parent != parent {
            return Err(invariant(format!(
                "{} points at parent {}, expected {}",
                page_id, node.parent, parent
            )));
        }

        let is_root = !parent.is_valid();
        let (size, limit, floor) = if node.is_leaf {
            let floor = if is_root { 1 } else { node.min_size };
            (node.keys.len(), node.max_size - 1, floor)
        } else {
            let floor = if is_root { 2 } else { node.min_size };
            (node.children.len(), node.max_size, floor)
        };
        if size < floor || size > limit {
            return Err(invariant(format!(
                "{} holds {} entries, allowed {}..={}",
                page_id, size, floor, limit
            )));
        }

        if node.keys.windows(2).any(|w| w[0] >= w[1]) {
            return Err(invariant(format!("{} keys out of order", page_id)));
        }
        let below_lower = |k: &K| lower.is_some_and(|lo| k < lo);
        let above_upper = |k: &K| upper.is_some_and(|hi| k >= hi);
        if node.keys.iter().any(|k| below_lower(k) || above_upper(k)) {
            return Err(invariant(format!("{} has keys outside its separators", page_id)));
        }

        if node.is_leaf {
            match walk.leaf_depth {
                Some(d) if d != depth => {
                    return Err(invariant(format!(
                        "{} at depth {}, other leaves at {}",
                        page_id, depth, d
                    )));
                }
                _ => walk.leaf_depth = Some(depth),
            }
            walk.leaves.push(page_id);
            return Ok(());
        }

        for (i, &child) in node.children.iter().enumerate() {
            let lo = if i == 0 { lower } else { Some(&node.keys[i - 1]) };
            let hi = node.keys.get(i).or(upper);
            self.check_node(child, page_id, lo, hi, depth + 1, walk)?;
        }
        Ok(())
    }
}

impl<K, V> BPlusTree<K, V>
where
    K: Storable + Ord + fmt::Debug,
    V: Storable,
{
    /// One line per node, level by level.
    pub fn dump(&self) -> Result<String> {
        let mut out = String::new();
        let mut level: VecDeque<PageId> = VecDeque::new();
        let root = self.root_page_id();
        if !root.is_valid() {
            out.push_str("(empty)\n");
            return Ok(out);
        }
        level.push_back(root);

        let mut depth = 0;
        while !level.is_empty() {
            let _ = writeln!(out, "level {}:", depth);
            let mut next_level = VecDeque::new();
            for page_id in level.drain(..) {
                let node = self.snapshot(page_id)?;
                if node.is_leaf {
                    let _ = writeln!(
                        out,
                        "  {} leaf parent={} next={} keys={:?}",
                        page_id, node.parent, node.next, node.keys
                    );
                } else {
                    let _ = writeln!(
                        out,
                        "  {} internal parent={} keys={:?} children={:?}",
                        page_id,
                        node.parent,
                        node.keys,
                        node.children.iter().map(|c| c.0).collect::<Vec<_>>()
                    );
                    next_level.extend(node.children);
                }
            }
            level = next_level;
            depth += 1;
        }
        Ok(out)
    }

    /// Graphviz rendering of the tree.
    pub fn to_dot(&self) -> Result<String> {
        let mut out = String::from("digraph btree {\n  node [shape=record];\n");
        let mut pending = vec![self.root_page_id()];
        while let Some(page_id) = pending.pop() {
            if !page_id.is_valid() {
                continue;
            }
            let node = self.snapshot(page_id)?;
            let label = node
                .keys
                .iter()
                .map(|k| format!("{:?}", k))
                .collect::<Vec<_>>()
                .join("|");
            let kind = if node.is_leaf { "L" } else { "I" };
            let _ = writeln!(out, "  p{} [label=\"{}{}|{}\"];", page_id.0, kind, page_id.0, label);
            for child in &node.children {
                let _ = writeln!(out, "  p{} -> p{};", page_id.0, child.0);
            }
            if node.next.is_valid() {
                let _ = writeln!(out, "  p{} -> p{} [style=dashed];", page_id.0, node.next.0);
            }
            pending.extend(node.children.iter().rev());
        }
        out.push_str("}\n");
        Ok(out)
    }
}

struct NodeSnapshot<K> {
    parent: PageId,
    is_leaf: bool,
    max_size: usize,
    min_size: usize,
    keys: Vec<K>,
    children: Vec<PageId>,
    next: PageId,
}

struct Walk {
    leaf_depth: Option<usize>,
    leaves: Vec<PageId>,
}

fn invariant(msg: String) -> Error {
    Error::TreeInvariant(msg)
}
