//! Page fetcher.

use super::args::{PageLimits, PageStart, PageWindow, PaginationArgs};
use super::connection::Connection;
use crate::error::Result;
use crate::filter::{Filter, Row};
use crate::source::{DataSource, ScanRequest};

/// One window of rows plus its metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct Page<R> {
    /// Rows in ascending id order.
    pub rows: Vec<R>,
    /// At least one matching row follows the last returned row.
    pub has_next_page: bool,
    /// The window does not start at the first matching row.
    pub has_previous_page: bool,
    /// Rows matching the filter, regardless of the window.
    pub total_count: u64,
}

impl<R> Page<R> {
    pub fn empty() -> Self {
        Self {
            rows: Vec::new(),
            has_next_page: false,
            has_previous_page: false,
            total_count: 0,
        }
    }
}

/// Turns filtered table scans into resumable pages.
///
/// The fetcher is stateless; sharing one across threads is fine.
#[derive(Clone, Copy, Debug, Default)]
pub struct PageFetcher {
    limits: PageLimits,
}

impl PageFetcher {
    pub fn new(limits: PageLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &PageLimits {
        &self.limits
    }

    /// Fetch one page of rows matching `filter` from `source`.
    ///
    /// The filter is opaque here; the only condition the fetcher adds is its
    /// own bound on `id` when working out `has_previous_page` for a cursor.
    pub fn fetch<R, S>(&self, source: &S, filter: &Filter, args: &PaginationArgs) -> Result<Page<R>>
    where
        R: Row,
        S: DataSource<R> + ?Sized,
    {
        let window = PageWindow::resolve(args, &self.limits)?;

        let total_count = source.count(filter)?;

        // One extra row tells us whether another page follows.
        let mut request = ScanRequest::new(filter, window.size + 1);
        let has_previous_page = match window.start {
            PageStart::Beginning => false,
            PageStart::Offset(n) => {
                request = request.skip(n);
                total_count > 0
            }
            PageStart::After(id) => {
                request = request.after(id);
                let before = filter.clone().le("id", id);
                source.count(&before)? > 0
            }
        };

        let mut rows = source.scan(&request)?;
        let has_next_page = rows.len() > window.size;
        rows.truncate(window.size);

        tracing::debug!(
            filter = %filter,
            start = ?window.start,
            size = window.size,
            returned = rows.len(),
            total_count,
            "fetched page"
        );

        Ok(Page {
            rows,
            has_next_page,
            has_previous_page,
            total_count,
        })
    }

    /// Fetch a page and wrap it as a connection.
    pub fn fetch_connection<R, S>(
        &self,
        source: &S,
        filter: &Filter,
        args: &PaginationArgs,
    ) -> Result<Connection<R>>
    where
        R: Row,
        S: DataSource<R> + ?Sized,
    {
        self.fetch(source, filter, args).map(Connection::from_page)
    }
}

/// Fetch a connection with the default page limits.
pub fn fetch_connection<R, S>(source: &S, filter: &Filter, args: &PaginationArgs) -> Result<Connection<R>>
where
    R: Row,
    S: DataSource<R> + ?Sized,
{
    PageFetcher::default().fetch_connection(source, filter, args)
}
