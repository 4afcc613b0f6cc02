//! Pagination arguments and their validation.

use super::cursor;
use crate::error::{FeedError, Result};
use crate::types::RowId;
use serde::{Deserialize, Serialize};

/// Page size used when `first` is absent.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Largest page a caller may request.
pub const MAX_PAGE_SIZE: u32 = 50;

/// Caller-supplied pagination arguments, as they arrive from the API layer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationArgs {
    /// Page size.
    pub first: Option<i32>,
    /// Matching rows to skip. Ignored when `after` is set.
    pub offset: Option<i32>,
    /// Resume after the row this cursor points at.
    pub after: Option<String>,
}

impl PaginationArgs {
    pub fn first(n: i32) -> Self {
        Self {
            first: Some(n),
            ..Default::default()
        }
    }

    pub fn with_offset(mut self, offset: i32) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_after(mut self, after: impl Into<String>) -> Self {
        self.after = Some(after.into());
        self
    }
}

/// Page size bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageLimits {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

impl PageLimits {
    /// Check the limits are usable.
    pub fn validate(&self) -> Result<()> {
        if self.max_page_size == 0 {
            return Err(FeedError::Config("max_page_size must be at least 1".into()));
        }
        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            return Err(FeedError::Config(format!(
                "default_page_size must be in [1, {}], got {}",
                self.max_page_size, self.default_page_size
            )));
        }
        Ok(())
    }
}

/// Where a page starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageStart {
    /// First matching row.
    Beginning,
    /// Skip this many matching rows.
    Offset(u64),
    /// Rows with an id strictly greater than this one.
    After(RowId),
}

/// Validated pagination window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageWindow {
    pub size: usize,
    pub start: PageStart,
}

impl PageWindow {
    /// Validate `args` against `limits`.
    ///
    /// `first` must lie in `[1, max_page_size]` and `offset` must not be
    /// negative; nothing is silently clamped. When both `after` and `offset`
    /// are given, `after` wins.
    pub fn resolve(args: &PaginationArgs, limits: &PageLimits) -> Result<Self> {
        let size = match args.first {
            None => limits.default_page_size,
            Some(n) if n >= 1 && n as u32 <= limits.max_page_size => n as u32,
            Some(n) => {
                return Err(FeedError::InvalidArgument(format!(
                    "first must be between 1 and {}, got {}",
                    limits.max_page_size, n
                )))
            }
        };

        let offset = match args.offset {
            Some(n) if n < 0 => {
                return Err(FeedError::InvalidArgument(format!(
                    "offset must not be negative, got {}",
                    n
                )))
            }
            Some(n) => Some(n as u64),
            None => None,
        };

        let start = match (&args.after, offset) {
            (Some(after), _) => PageStart::After(cursor::decode(after)?),
            (None, Some(0)) | (None, None) => PageStart::Beginning,
            (None, Some(n)) => PageStart::Offset(n),
        };

        Ok(Self {
            size: size as usize,
            start,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagination::cursor::encode;

    fn resolve(args: PaginationArgs) -> Result<PageWindow> {
        PageWindow::resolve(&args, &PageLimits::default())
    }

    #[test]
    fn test_defaults() {
        let window = resolve(PaginationArgs::default()).unwrap();
        assert_eq!(window.size, DEFAULT_PAGE_SIZE as usize);
        assert_eq!(window.start, PageStart::Beginning);
    }

    #[test]
    fn test_first_bounds() {
        assert_eq!(resolve(PaginationArgs::first(1)).unwrap().size, 1);
        assert_eq!(resolve(PaginationArgs::first(50)).unwrap().size, 50);

        for bad in [0, -1, 51, i32::MAX] {
            assert!(matches!(
                resolve(PaginationArgs::first(bad)),
                Err(FeedError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn test_offset() {
        let window = resolve(PaginationArgs::first(5).with_offset(20)).unwrap();
        assert_eq!(window.start, PageStart::Offset(20));

        let window = resolve(PaginationArgs::first(5).with_offset(0)).unwrap();
        assert_eq!(window.start, PageStart::Beginning);

        assert!(matches!(
            resolve(PaginationArgs::first(5).with_offset(-3)),
            Err(FeedError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_after_wins_over_offset() {
        let args = PaginationArgs::first(5)
            .with_offset(20)
            .with_after(encode(RowId(9)));
        assert_eq!(resolve(args).unwrap().start, PageStart::After(RowId(9)));
    }

    #[test]
    fn test_bad_cursor() {
        let args = PaginationArgs::first(5).with_after("not-a-cursor");
        assert!(matches!(resolve(args), Err(FeedError::InvalidCursor(_))));
    }

    #[test]
    fn test_limits_validation() {
        assert!(PageLimits::default().validate().is_ok());
        assert!(PageLimits {
            default_page_size: 0,
            max_page_size: 10
        }
        .validate()
        .is_err());
        assert!(PageLimits {
            default_page_size: 20,
            max_page_size: 10
        }
        .validate()
        .is_err());
    }
}
