//! Buffer pool management.
//!
//! The buffer pool is the in-memory cache between the index and disk. It
//! manages a fixed pool of frames, each holding at most one page.
//!
//! # Components
//! - [`BufferPoolManager`] - The page cache
//! - [`Frame`] - A slot in the buffer pool holding a page + metadata
//! - [`PageReadGuard`] / [`PageWriteGuard`] / [`PageGuard`] - RAII guards
//! - [`BufferPoolStats`] - Performance statistics
//! - [`replacer`] - LRU-K eviction policy

mod buffer_pool_manager;
mod frame;
mod page_guard;
pub mod replacer;
mod stats;

pub use buffer_pool_manager::BufferPoolManager;
pub use frame::Frame;
pub use page_guard::{PageGuard, PageReadGuard, PageWriteGuard};
pub use replacer::LruKReplacer;
pub use stats::{BufferPoolStats, StatsSnapshot};
