//! Page-granular access to the database file.

use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::{debug, trace};

use crate::common::config::{MAX_PAGES, PAGE_SIZE};
use crate::common::{Error, PageId, Result};
use crate::storage::page::Page;

const ZERO_PAGE: [u8; PAGE_SIZE] = [0; PAGE_SIZE];

/// Reads, writes and hands out fixed-size page slots of one file.
///
/// ```text
///  offset 0      4096     8192            N*4096
///  ┌────────┬────────┬────────┬─ ─ ─ ─┬────────┐
///  │ page 0 │ page 1 │ page 2 │       │ page N │
///  └────────┴────────┴────────┴─ ─ ─ ─┴────────┘
/// ```
///
/// Not synchronized; the buffer pool keeps it behind its state mutex.
/// Writes reach the OS cache only until [`sync`](Self::sync) is called.
/// Released slots are tracked in memory and forgotten on reopen, so a
/// slot released and never reused stays allocated in the file.
pub struct DiskManager {
    file: File,
    page_count: u32,
    /// Lowest id is reused first.
    free_pages: BTreeSet<PageId>,
}

impl DiskManager {
    /// Create a new, empty database file.
    ///
    /// # Errors
    /// `Error::Io` if the file exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "created database file");
        Ok(Self::from_file(file, 0))
    }

    /// Open an existing database file. A trailing partial page is ignored.
    ///
    /// # Errors
    /// `Error::Io` if the file is missing or unreadable.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path.as_ref())?;
        let pages = file.metadata()?.len() / PAGE_SIZE as u64;
        let page_count = u32::try_from(pages).map_err(|_| Error::InvalidPageId(u32::MAX))?;
        debug!(path = %path.as_ref().display(), page_count, "opened database file");
        Ok(Self::from_file(file, page_count))
    }

    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        match path.as_ref().exists() {
            true => Self::open(path),
            false => Self::create(path),
        }
    }

    fn from_file(file: File, page_count: u32) -> Self {
        Self {
            file,
            page_count,
            free_pages: BTreeSet::new(),
        }
    }

    /// # Errors
    /// `Error::PageNotFound` for a slot the file does not have.
    pub fn read_page(&mut self, page_id: PageId, page: &mut Page) -> Result<()> {
        self.seek_to(page_id)?;
        self.file.read_exact(page.as_mut_slice())?;
        Ok(())
    }

    /// # Errors
    /// `Error::PageNotFound` for a slot the file does not have.
    pub fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        self.seek_to(page_id)?;
        self.file.write_all(page.as_slice())?;
        Ok(())
    }

    /// Hand out a zeroed slot, reusing a released one when possible and
    /// growing the file otherwise.
    pub fn allocate_page(&mut self) -> Result<PageId> {
        let page_id = match self.free_pages.pop_first() {
            Some(reused) => {
                trace!(page_id = %reused, "reusing released page slot");
                reused
            }
            None => {
                if u64::from(self.page_count) + 1 >= MAX_PAGES {
                    return Err(Error::InvalidPageId(self.page_count));
                }
                self.page_count += 1;
                PageId::new(self.page_count - 1)
            }
        };
        self.file.seek(SeekFrom::Start(page_id.file_offset()))?;
        self.file.write_all(&ZERO_PAGE)?;
        Ok(page_id)
    }

    /// Put a slot back for reuse. Releasing twice is the same as once.
    pub fn deallocate_page(&mut self, page_id: PageId) -> Result<()> {
        self.check_allocated(page_id)?;
        self.free_pages.insert(page_id);
        Ok(())
    }

    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Slots in the file, released ones included.
    #[inline]
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    #[inline]
    pub fn free_page_count(&self) -> usize {
        self.free_pages.len()
    }

    #[inline]
    pub fn file_size(&self) -> u64 {
        PageId::new(self.page_count).file_offset()
    }

    fn check_allocated(&self, page_id: PageId) -> Result<()> {
        match page_id {
            id if !id.is_valid() => Err(Error::InvalidPageId(id.0)),
            id if id.0 >= self.page_count => Err(Error::PageNotFound(id.0)),
            _ => Ok(()),
        }
    }

    fn seek_to(&mut self, page_id: PageId) -> Result<()> {
        self.check_allocated(page_id)?;
        self.file.seek(SeekFrom::Start(page_id.file_offset()))?;
        Ok(())
    }
}
