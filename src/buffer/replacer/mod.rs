//! Eviction policy (replacer).
//!
//! - [`LruKReplacer`] - LRU-K: frames with fewer than K recorded accesses are
//!   evicted first, oldest first; among the rest, least recently used wins.

mod lru_k;

pub use lru_k::LruKReplacer;
