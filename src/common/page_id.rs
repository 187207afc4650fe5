//! Page identifier.

use std::fmt;

/// Number of a page in the database file; page N starts at byte
/// `N * PAGE_SIZE`.
///
/// `u32::MAX` is the "no page" sentinel. Tree nodes store it for a missing
/// parent or next-leaf link and the header page stores it for an empty tree.
///
/// ```
/// use pagedb::PageId;
///
/// assert!(PageId::new(0).is_valid());
/// assert!(!PageId::INVALID.is_valid());
/// assert_eq!(PageId::default(), PageId::INVALID);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub u32);

impl PageId {
    pub const INVALID: PageId = PageId(u32::MAX);

    #[inline]
    pub fn new(id: u32) -> Self {
        PageId(id)
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }

    /// Byte offset of this page in the database file.
    #[inline]
    pub fn file_offset(&self) -> u64 {
        u64::from(self.0) * crate::common::config::PAGE_SIZE as u64
    }
}

impl Default for PageId {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.is_valid() {
            true => write!(f, "page#{}", self.0),
            false => f.write_str("page#none"),
        }
    }
}
