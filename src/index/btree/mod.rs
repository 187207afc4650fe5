//! Disk-backed B+Tree index.
//!
//! - [`BPlusTree`] - ordered unique-key map with latch crabbing
//! - [`TreeIter`] - forward cursor over the leaf chain
//! - [`LeafNode`] / [`InternalNode`] - typed views over node pages
//! - [`Storable`] - fixed-width key and value encoding
//!
//! Every node lives in a buffer pool page and is only touched through a page
//! guard, so a node view never outlives the pin it was built from.

mod codec;
mod context;
mod internal_page;
mod iterator;
mod leaf_page;
mod node;
mod tree;

pub use codec::Storable;
pub use internal_page::InternalNode;
pub use iterator::TreeIter;
pub use leaf_page::LeafNode;
pub use node::{Operation, TreePage};
pub use tree::{BPlusTree, BTreeOptions};
