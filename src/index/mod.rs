//! Index structures.
//!
//! - [`btree`] - Concurrent B+Tree over the buffer pool

pub mod btree;
