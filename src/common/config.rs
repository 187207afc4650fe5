//! Compile-time limits and defaults.

/// Bytes per page, on disk and in a frame.
pub const PAGE_SIZE: usize = 4096;

/// Page ids are `u32` and `u32::MAX` is the sentinel, so this many ids
/// exist in total. The file never grows to include the sentinel slot.
pub const MAX_PAGES: u64 = 1 << 32;

/// Frames in a pool built by `BufferPoolManager::with_defaults`.
pub const DEFAULT_POOL_SIZE: usize = 64;

/// K used by `BufferPoolManager::with_defaults`.
pub const DEFAULT_REPLACER_K: usize = 2;

/// Longest tree name the header page can record, in bytes.
pub const MAX_INDEX_NAME_LEN: usize = 32;
