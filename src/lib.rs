//! pagedb - a paged storage engine with an LRU-K buffer pool and a
//! concurrent B+Tree index.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                             pagedb                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │              Index Layer (index/btree)                  │    │
//! │  │   BPlusTree: latch crabbing, split / coalesce /         │    │
//! │  │   redistribute, leaf-chain iterator, header root record │    │
//! │  └─────────────────────────────────────────────────────────┘    │
//! │                              ↓ page guards                      │
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │              Buffer Pool (buffer/)                      │    │
//! │  │   BufferPoolManager + Frame + LruKReplacer + Statistics │    │
//! │  └─────────────────────────────────────────────────────────┘    │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │              Storage Layer (storage/)                   │    │
//! │  │   DiskManager + Page + PageHeader + HeaderPage          │    │
//! │  └─────────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, FrameId, RecordId, Error, config)
//! - [`buffer`] - Buffer pool management and LRU-K eviction
//! - [`storage`] - Disk I/O and page formats
//! - [`index`] - The B+Tree
//!
//! # Quick Start
//! ```no_run
//! use std::sync::Arc;
//! use pagedb::{BPlusTree, BTreeOptions, BufferPoolManager, DiskManager};
//!
//! let dm = DiskManager::open_or_create("my_database.db")?;
//! let bpm = Arc::new(BufferPoolManager::with_defaults(dm)?);
//! let tree: BPlusTree<u64, u64> = BPlusTree::new("primary", bpm, BTreeOptions::max_for::<u64, u64>())?;
//!
//! tree.insert(&1, &100)?;
//! for item in tree.iter()? {
//!     let (key, value) = item?;
//!     println!("{key} -> {value}");
//! }
//! # Ok::<(), pagedb::Error>(())
//! ```

pub mod buffer;
pub mod common;
pub mod index;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::PAGE_SIZE;
pub use common::{Error, FrameId, PageId, RecordId, Result};

pub use buffer::{BufferPoolManager, BufferPoolStats, Frame, LruKReplacer, StatsSnapshot};
pub use index::btree::{BPlusTree, BTreeOptions, Storable, TreeIter};
pub use storage::page::{HeaderPage, Page, PageHeader, PageType, HEADER_PAGE_ID};
pub use storage::DiskManager;
