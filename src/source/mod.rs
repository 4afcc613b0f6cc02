//! Data sources the pagination engine reads from.
//!
//! A source is an explicitly passed capability: every operation receives the
//! source it works against instead of reaching for a global handle.
//!
//! - [`MemoryTable`]: rows kept in process memory
//! - [`LogTable`]: rows persisted to an append-only, checksummed log

mod log;
mod memory;

pub use log::LogTable;
pub use memory::MemoryTable;

use crate::error::Result;
use crate::filter::{Filter, Row};
use crate::types::RowId;

/// One ordered scan over a source. Rows are always returned in ascending id
/// order.
#[derive(Clone, Debug)]
pub struct ScanRequest<'a> {
    /// Rows must satisfy this filter.
    pub filter: &'a Filter,
    /// Only rows with an id strictly greater than this one.
    pub start_after: Option<RowId>,
    /// Matching rows to skip before collecting.
    pub skip: u64,
    /// Maximum number of rows to return.
    pub limit: usize,
}

impl<'a> ScanRequest<'a> {
    pub fn new(filter: &'a Filter, limit: usize) -> Self {
        Self {
            filter,
            start_after: None,
            skip: 0,
            limit,
        }
    }

    pub fn after(mut self, id: RowId) -> Self {
        self.start_after = Some(id);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    /// Apply this request to rows already ordered by ascending id.
    pub(crate) fn collect<'r, R, I>(&self, rows: I) -> Vec<R>
    where
        R: Row + 'r,
        I: Iterator<Item = &'r R>,
    {
        rows.filter(|row| self.start_after.map_or(true, |after| row.id() > after))
            .filter(|row| self.filter.matches(*row))
            .skip(usize::try_from(self.skip).unwrap_or(usize::MAX))
            .take(self.limit)
            .cloned()
            .collect()
    }
}

/// Read capability over a table of rows.
///
/// Both operations fail with [`FeedError::SourceUnavailable`] when the backing
/// store cannot be reached. Retrying is up to the implementation.
///
/// [`FeedError::SourceUnavailable`]: crate::error::FeedError::SourceUnavailable
pub trait DataSource<R: Row>: Send + Sync {
    /// Count rows satisfying `filter`.
    fn count(&self, filter: &Filter) -> Result<u64>;

    /// Fetch rows for `request`, ordered by ascending id.
    fn scan(&self, request: &ScanRequest<'_>) -> Result<Vec<R>>;

    /// Fetch a single row by id.
    fn get(&self, id: RowId) -> Result<Option<R>> {
        let filter = Filter::all().eq("id", id);
        Ok(self.scan(&ScanRequest::new(&filter, 1))?.into_iter().next())
    }
}

/// Write capability over a table of rows.
pub trait WriteSource<R: Row>: DataSource<R> {
    /// Insert a row built from the next free id and return it.
    fn insert_with<F>(&self, build: F) -> Result<R>
    where
        F: FnOnce(RowId) -> R;

    /// Delete a row. Returns whether it existed.
    fn delete(&self, id: RowId) -> Result<bool>;
}
