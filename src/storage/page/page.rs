//! The in-memory image of one disk page.

use crate::common::config::PAGE_SIZE;

use super::page_header::{PageHeader, PageType};

/// 4KB of bytes, aligned to 4KB.
///
/// Formats are not baked in: typed views such as
/// [`HeaderPage`](super::HeaderPage) or the B+Tree nodes borrow the bytes
/// for as long as a page guard is held. Copies are explicit through
/// [`Page::copy_from`].
///
/// ```
/// use pagedb::{Page, PageType};
///
/// let mut page = Page::new();
/// page.as_mut_slice()[0] = PageType::BTreeLeaf as u8;
/// assert_eq!(page.page_type(), PageType::BTreeLeaf);
/// ```
#[repr(align(4096))]
pub struct Page {
    data: [u8; PAGE_SIZE],
}

impl Page {
    #[inline]
    pub fn new() -> Self {
        Self {
            data: [0; PAGE_SIZE],
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn reset(&mut self) {
        self.data.fill(0);
    }

    pub fn copy_from(&mut self, other: &Page) {
        self.data = other.data;
    }

    pub fn header(&self) -> PageHeader {
        PageHeader::read(&self.data)
    }

    pub fn set_header(&mut self, header: &PageHeader) {
        header.write(&mut self.data);
    }

    #[inline]
    pub fn page_type(&self) -> PageType {
        PageType::of(&self.data)
    }

    /// Store the checksum of the current contents. Call after the last
    /// change that should be covered.
    pub fn update_checksum(&mut self) {
        PageHeader::stamp_checksum(&mut self.data);
    }

    pub fn verify_checksum(&self) -> bool {
        self.header().matches(&self.data)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}
