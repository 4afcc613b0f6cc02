//! Cursor-based pagination.
//!
//! A page request flows through three pieces:
//! - [`PageWindow`] validates the caller's [`PaginationArgs`]
//! - [`PageFetcher`] scans the source for one window plus a look-ahead row
//! - [`Connection`] wraps the page into edges and page info
//!
//! Following `end_cursor` from the first page visits every matching row
//! exactly once, in ascending id order, even while new rows are inserted:
//! ids only grow, so new rows land after any cursor already handed out.
//!
//! # Example
//!
//! ```ignore
//! let filter = Filter::all().eq("reply_to", parent.id);
//! let mut args = PaginationArgs::first(20);
//! loop {
//!     let page = fetch_connection(&posts, &filter, &args)?;
//!     render(page.nodes());
//!     if !page.page_info.has_next_page {
//!         break;
//!     }
//!     args.after = page.page_info.end_cursor.map(String::from);
//! }
//! ```

mod args;
pub mod cursor;
mod connection;
mod fetcher;

pub use args::{PageLimits, PageStart, PageWindow, PaginationArgs, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use connection::{Connection, Edge, PageInfo};
pub use cursor::Cursor;
pub use fetcher::{fetch_connection, Page, PageFetcher};
