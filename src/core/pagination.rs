//! Page metadata shared by every listing endpoint.

use serde::Serialize;

/// Metadata describing one page of a filtered result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pagination {
    /// The page that was returned, 1-based
    pub current_page: u64,
    /// `ceil(total_items / items_per_page)`
    pub total_pages: u64,
    /// Total rows matching the filter
    pub total_items: u64,
    /// Requested page size
    pub items_per_page: u64,
    /// True iff `current_page < total_pages`
    pub has_next_page: bool,
    /// True iff `current_page > 1`
    pub has_prev_page: bool,
}

impl Pagination {
    /// Builds metadata for the given page request and total row count.
    ///
    /// Page and page size are clamped to at least 1 so malformed requests
    /// degrade to the first page rather than erroring.
    #[must_use]
    pub fn new(page: u64, page_size: u64, total_items: u64) -> Self {
        let items_per_page = page_size.max(1);
        let current_page = page.max(1);
        let total_pages = total_items.div_ceil(items_per_page);

        Self {
            current_page,
            total_pages,
            total_items,
            items_per_page,
            has_next_page: current_page < total_pages,
            has_prev_page: current_page > 1,
        }
    }

    /// Row offset of the first item on the requested page.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        (self.current_page - 1) * self.items_per_page
    }
}

/// One page of items plus its metadata.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    /// The rows on this page
    pub items: Vec<T>,
    /// Position of this page within the full result set
    pub pagination: Pagination,
}

impl<T> Page<T> {
    /// An empty page for a filter that matched nothing.
    #[must_use]
    pub fn empty(page: u64, page_size: u64) -> Self {
        Self {
            items: Vec::new(),
            pagination: Pagination::new(page, page_size, 0),
        }
    }
}
