//! Header page: the directory of index roots.
//!
//! Page 0 of every database file maps index names to the page id of their
//! current root, so a tree can be reopened after a restart.
//!
//! # Layout
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       5     PageHeader (type = TreeHeader, checksum)
//! 5       4     record count (u32, little-endian)
//! 9       36*n  records: 32-byte zero-padded name + u32 root page id
//! ```

use crate::common::config::{MAX_INDEX_NAME_LEN, PAGE_SIZE};
use crate::common::{Error, PageId, Result};

use super::page_header::{read_u32, write_u32, PageHeader, PageType};

/// Page id reserved for the header page.
pub const HEADER_PAGE_ID: PageId = PageId(0);

const OFFSET_COUNT: usize = PageHeader::SIZE;
const OFFSET_RECORDS: usize = OFFSET_COUNT + 4;
const RECORD_SIZE: usize = MAX_INDEX_NAME_LEN + 4;

/// Typed view over the bytes of the header page.
pub struct HeaderPage<B> {
    data: B,
}

impl<B: AsRef<[u8]>> HeaderPage<B> {
    /// Maximum number of records that fit on one page.
    pub const CAPACITY: usize = (PAGE_SIZE - OFFSET_RECORDS) / RECORD_SIZE;

    pub fn new(data: B) -> Self {
        Self { data }
    }

    fn bytes(&self) -> &[u8] {
        self.data.as_ref()
    }

    /// Whether the page has been formatted as a header page.
    pub fn is_initialized(&self) -> bool {
        PageType::of(self.bytes()) == PageType::TreeHeader
    }

    /// Check the type tag and checksum.
    pub fn validate(&self) -> Result<()> {
        let header = PageHeader::read(self.bytes());
        if header.page_type != PageType::TreeHeader {
            return Err(Error::corrupted(
                HEADER_PAGE_ID.0,
                format!("expected header page, found {:?}", header.page_type),
            ));
        }
        if !header.matches(self.bytes()) {
            return Err(Error::corrupted(HEADER_PAGE_ID.0, "checksum mismatch"));
        }
        if self.record_count() > Self::CAPACITY {
            return Err(Error::corrupted(HEADER_PAGE_ID.0, "record count out of range"));
        }
        Ok(())
    }

    pub fn record_count(&self) -> usize {
        read_u32(self.bytes(), OFFSET_COUNT) as usize
    }

    /// Root page id registered for `name`, if any.
    pub fn get_root_id(&self, name: &str) -> Option<PageId> {
        self.find(name)
            .map(|i| PageId(read_u32(self.bytes(), record_offset(i) + MAX_INDEX_NAME_LEN)))
    }

    /// All (name, root) records in slot order.
    pub fn records(&self) -> Vec<(String, PageId)> {
        (0..self.record_count())
            .map(|i| {
                let off = record_offset(i);
                let raw = &self.bytes()[off..off + MAX_INDEX_NAME_LEN];
                let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
                let name = String::from_utf8_lossy(&raw[..end]).into_owned();
                (name, PageId(read_u32(self.bytes(), off + MAX_INDEX_NAME_LEN)))
            })
            .collect()
    }

    fn find(&self, name: &str) -> Option<usize> {
        let wanted = encode_name(name).ok()?;
        (0..self.record_count()).find(|&i| {
            let off = record_offset(i);
            self.bytes()[off..off + MAX_INDEX_NAME_LEN] == wanted
        })
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> HeaderPage<B> {
    fn bytes_mut(&mut self) -> &mut [u8] {
        self.data.as_mut()
    }

    /// Format the page as an empty header page.
    pub fn init(&mut self) {
        let bytes = self.bytes_mut();
        bytes.fill(0);
        PageHeader::new(PageType::TreeHeader).write(bytes);
        self.refresh_checksum();
    }

    /// Add a record. Returns `false` if `name` is already registered.
    pub fn insert_record(&mut self, name: &str, root: PageId) -> Result<bool> {
        let encoded = encode_name(name)?;
        if self.find(name).is_some() {
            return Ok(false);
        }
        let count = self.record_count();
        if count >= Self::CAPACITY {
            return Err(Error::HeaderPageFull);
        }

        let off = record_offset(count);
        let bytes = self.bytes_mut();
        bytes[off..off + MAX_INDEX_NAME_LEN].copy_from_slice(&encoded);
        write_u32(bytes, off + MAX_INDEX_NAME_LEN, root.0);
        write_u32(bytes, OFFSET_COUNT, count as u32 + 1);
        self.refresh_checksum();
        Ok(true)
    }

    /// Change the root of an existing record. Returns `false` if absent.
    pub fn update_record(&mut self, name: &str, root: PageId) -> bool {
        let Some(i) = self.find(name) else {
            return false;
        };
        write_u32(self.bytes_mut(), record_offset(i) + MAX_INDEX_NAME_LEN, root.0);
        self.refresh_checksum();
        true
    }

    pub fn insert_or_update(&mut self, name: &str, root: PageId) -> Result<()> {
        if !self.update_record(name, root) {
            self.insert_record(name, root)?;
        }
        Ok(())
    }

    /// Remove a record, compacting the rest. Returns `false` if absent.
    pub fn delete_record(&mut self, name: &str) -> bool {
        let Some(i) = self.find(name) else {
            return false;
        };
        let count = self.record_count();
        let bytes = self.bytes_mut();
        bytes.copy_within(record_offset(i + 1)..record_offset(count), record_offset(i));
        bytes[record_offset(count - 1)..record_offset(count)].fill(0);
        write_u32(bytes, OFFSET_COUNT, count as u32 - 1);
        self.refresh_checksum();
        true
    }

    fn refresh_checksum(&mut self) {
        PageHeader::stamp_checksum(self.bytes_mut());
    }
}

fn record_offset(i: usize) -> usize {
    OFFSET_RECORDS + i * RECORD_SIZE
}

/// Reject names that cannot be stored in a header record.
pub(crate) fn check_index_name(name: &str) -> Result<()> {
    encode_name(name).map(|_| ())
}

fn encode_name(name: &str) -> Result<[u8; MAX_INDEX_NAME_LEN]> {
    let raw = name.as_bytes();
    if raw.is_empty() || raw.len() > MAX_INDEX_NAME_LEN || raw.contains(&0) {
        return Err(Error::InvalidConfig(format!(
            "index name must be 1..={} non-NUL bytes, got {:?}",
            MAX_INDEX_NAME_LEN, name
        )));
    }
    let mut out = [0u8; MAX_INDEX_NAME_LEN];
    out[..raw.len()].copy_from_slice(raw);
    Ok(out)
}
