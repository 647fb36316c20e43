use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::table_data::TableDataRequest;

pub const DEFAULT_PAGE_SIZE: usize = 50;

/// What a page switch does with unsaved edits of the page being left.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum NavigationPolicy {
    /// Drop them silently; the refetch clears the ledger.
    #[default]
    Discard,
    /// Refuse to navigate until they are saved or discarded.
    BlockWhenDirty,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaginationError {
    #[error("page size must be greater than 0")]
    ZeroPageSize,
    #[error("page size {0} is not one of the allowed sizes")]
    UnsupportedPageSize(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    current_page: usize,
    page_size: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            current_page: 0,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pagination {
    pub fn new(page_size: usize) -> Result<Self, PaginationError> {
        if page_size == 0 {
            return Err(PaginationError::ZeroPageSize);
        }
        Ok(Self {
            current_page: 0,
            page_size,
        })
    }

    #[must_use]
    pub fn current_page(&self) -> usize {
        self.current_page
    }

    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Not clamped; the server answers an out-of-range offset with no rows.
    pub fn set_page(&mut self, page: usize) {
        self.current_page = page;
    }

    /// Always returns to the first page.
    pub fn set_page_size(&mut self, page_size: usize) -> Result<(), PaginationError> {
        if page_size == 0 {
            return Err(PaginationError::ZeroPageSize);
        }
        self.page_size = page_size;
        self.current_page = 0;
        Ok(())
    }

    #[must_use]
    pub fn offset(&self) -> usize {
        self.current_page.saturating_mul(self.page_size)
    }

    #[must_use]
    pub fn request(&self, schema: &str, table: &str) -> TableDataRequest {
        TableDataRequest {
            schema: schema.to_string(),
            table: table.to_string(),
            limit: self.page_size,
            offset: self.offset(),
        }
    }

    #[must_use]
    pub fn page_count(&self, total_count: usize) -> usize {
        total_count.div_ceil(self.page_size)
    }

    #[must_use]
    pub fn can_previous(&self) -> bool {
        self.current_page > 0
    }

    #[must_use]
    pub fn can_next(&self, total_count: usize) -> bool {
        self.current_page
            .saturating_add(1)
            .saturating_mul(self.page_size)
            < total_count
    }

    /// 1-based `(first, last)` rows shown, or `None` past the end.
    #[must_use]
    pub fn display_range(&self, total_count: usize) -> Option<(usize, usize)> {
        let offset = self.offset();
        if offset >= total_count {
            return None;
        }
        let last = offset.saturating_add(self.page_size).min(total_count);
        Some((offset + 1, last))
    }
}
