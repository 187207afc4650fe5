//! The 5-byte prefix shared by every page format.
//!
//! ```text
//! 0   page type (u8)
//! 1   CRC32 of the page with bytes 1..5 skipped (u32, little-endian)
//! ```

/// Format tag in byte 0 of a page.
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    /// Zeroed or unknown.
    #[default]
    Invalid = 0,
    TreeHeader = 1,
    BTreeInternal = 2,
    BTreeLeaf = 3,
}

impl From<u8> for PageType {
    fn from(tag: u8) -> Self {
        match tag {
            1 => PageType::TreeHeader,
            2 => PageType::BTreeInternal,
            3 => PageType::BTreeLeaf,
            _ => PageType::Invalid,
        }
    }
}

impl PageType {
    /// Tag of the page whose bytes start `data`.
    #[inline]
    pub fn of(data: &[u8]) -> Self {
        data.first().copied().map_or(PageType::Invalid, PageType::from)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    pub page_type: PageType,
    pub checksum: u32,
}

impl PageHeader {
    pub const SIZE: usize = 5;
    pub const OFFSET_PAGE_TYPE: usize = 0;
    pub const OFFSET_CHECKSUM: usize = 1;

    pub fn new(page_type: PageType) -> Self {
        Self {
            page_type,
            checksum: 0,
        }
    }

    /// Decode the header at the start of `data`, which must hold at least
    /// [`PageHeader::SIZE`] bytes.
    pub fn read(data: &[u8]) -> Self {
        Self {
            page_type: PageType::of(data),
            checksum: read_u32(data, Self::OFFSET_CHECKSUM),
        }
    }

    pub fn write(&self, data: &mut [u8]) {
        data[Self::OFFSET_PAGE_TYPE] = self.page_type as u8;
        write_u32(data, Self::OFFSET_CHECKSUM, self.checksum);
    }

    /// CRC32 over a whole page except the checksum field.
    pub fn checksum_of(page: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&page[..Self::OFFSET_CHECKSUM]);
        hasher.update(&page[Self::OFFSET_CHECKSUM + 4..]);
        hasher.finalize()
    }

    /// Recompute the checksum of `page` and store it in place.
    pub fn stamp_checksum(page: &mut [u8]) {
        let checksum = Self::checksum_of(page);
        write_u32(page, Self::OFFSET_CHECKSUM, checksum);
    }

    pub fn matches(&self, page: &[u8]) -> bool {
        self.checksum == Self::checksum_of(page)
    }
}

/// Little-endian u32 at `off`.
#[inline]
pub(crate) fn read_u32(data: &[u8], off: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&data[off..off + 4]);
    u32::from_le_bytes(buf)
}

#[inline]
pub(crate) fn write_u32(data: &mut [u8], off: usize, value: u32) {
    data[off..off + 4].copy_from_slice(&value.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::PAGE_SIZE;

    #[test]
    fn test_unknown_tags_are_invalid() {
        assert_eq!(PageType::from(3), PageType::BTreeLeaf);
        assert_eq!(PageType::from(4), PageType::Invalid);
        assert_eq!(PageType::of(&[]), PageType::Invalid);
        assert_eq!(PageType::of(&[1, 0xFF]), PageType::TreeHeader);
    }

    #[test]
    fn test_header_bytes() {
        let mut buf = [0u8; 8];
        PageHeader {
            page_type: PageType::BTreeInternal,
            checksum: 0xDEAD_BEEF,
        }
        .write(&mut buf);
        assert_eq!(&buf[..5], &[2, 0xEF, 0xBE, 0xAD, 0xDE]);
        assert_eq!(PageHeader::read(&buf).checksum, 0xDEAD_BEEF);
    }

    #[test]
    fn test_stamped_checksum_detects_flips() {
        let mut page = vec![0u8; PAGE_SIZE];
        PageHeader::new(PageType::BTreeLeaf).write(&mut page);
        page[3000] = 0x11;
        PageHeader::stamp_checksum(&mut page);
        assert!(PageHeader::read(&page).matches(&page));

        // Restamping is stable because the field itself is skipped.
        let before = PageHeader::read(&page).checksum;
        PageHeader::stamp_checksum(&mut page);
        assert_eq!(PageHeader::read(&page).checksum, before);

        page[0] = PageType::BTreeInternal as u8;
        assert!(!PageHeader::read(&page).matches(&page));
    }
}
