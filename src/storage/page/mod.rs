//! Page types and layout.
//!
//! - [`Page`] - The raw 4KB data container
//! - [`PageHeader`] - Type tag and checksum at the start of every page
//! - [`PageType`] - Discriminator for different page formats
//! - [`HeaderPage`] - View over page 0, mapping index names to root pages

mod header_page;
#[allow(clippy::module_inception)]
mod page;
mod page_header;

pub(crate) use header_page::check_index_name;
pub(crate) use page_header::{read_u32, write_u32};
pub use header_page::{HeaderPage, HEADER_PAGE_ID};
pub use page::Page;
pub use page_header::{PageHeader, PageType};
