//! Error types for pagedb.

use thiserror::Error;

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// All errors the storage engine reports.
///
/// Expected negative outcomes (duplicate key on insert, missing key on
/// remove or lookup, flushing a page that is not resident) are not errors;
/// they come back as `false` / `None`. What ends up here is either resource
/// exhaustion, a caller precondition violation, or I/O and corruption.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from disk operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested page was never allocated on disk.
    #[error("Page {0} not found")]
    PageNotFound(u32),

    /// Every frame is pinned and none can be evicted.
    #[error("No free frames available in buffer pool")]
    NoFreeFrames,

    /// The page id is the sentinel or exceeds the addressable range.
    #[error("Invalid page ID: {0}")]
    InvalidPageId(u32),

    /// Frame id outside the configured pool size.
    #[error("Invalid frame ID: {0}")]
    InvalidFrameId(usize),

    /// Unpin of a page whose pin count is already zero.
    #[error("Page {0} is not pinned")]
    PageNotPinned(u32),

    /// Operation requires the page to be resident in the buffer pool.
    #[error("Page {0} is not resident in the buffer pool")]
    PageNotResident(u32),

    /// Delete of a page that still has active holders.
    #[error("Page {0} is pinned")]
    PagePinned(u32),

    /// Replacer was asked to drop tracking for a frame that is not evictable.
    #[error("Frame {0} is not evictable")]
    FrameNotEvictable(usize),

    /// Rejected configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// No room left for another record on the header page.
    #[error("Header page is full")]
    HeaderPageFull,

    /// Page contents failed validation.
    #[error("Page {page_id} corrupted: {reason}")]
    Corrupted { page_id: u32, reason: String },

    /// A B+Tree structural invariant does not hold.
    #[error("B+Tree invariant violated: {0}")]
    TreeInvariant(String),
}

impl Error {
    pub(crate) fn corrupted(page_id: u32, reason: impl Into<String>) -> Self {
        Error::Corrupted {
            page_id,
            reason: reason.into(),
        }
    }
}
