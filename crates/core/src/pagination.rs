//! Pagination utilities for API endpoints and engine queries
//!
//! Caller-supplied `page`, `size` and `limit` values are clamped into safe
//! ranges rather than rejected: `page >= 1` and `1 <= limit <= MAX_LIMIT`.
//!
//! # Example
//!
//! ```
//! use novel_hub_core::pagination::{PageRequest, MAX_LIMIT};
//!
//! let request = PageRequest::clamped(Some(-3), Some(500), 10);
//! assert_eq!(request.page, 1);
//! assert_eq!(request.size, MAX_LIMIT);
//! assert_eq!(request.offset(), 0);
//! ```

use serde::{Deserialize, Serialize};

/// Default number of items per page
pub const DEFAULT_LIMIT: usize = 10;

/// Maximum number of items per page
pub const MAX_LIMIT: usize = 50;

/// Clamps a 1-based page number; missing or non-positive becomes 1
pub fn clamp_page(page: Option<i64>) -> usize {
    match page {
        Some(p) if p > 1 => p as usize,
        _ => 1,
    }
}

/// Clamps a limit into `1..=MAX_LIMIT`; missing becomes `default`
pub fn clamp_limit(limit: Option<i64>, default: usize) -> usize {
    let value = match limit {
        Some(l) if l < 1 => 1,
        Some(l) => l.min(MAX_LIMIT as i64) as usize,
        None => default,
    };
    value.clamp(1, MAX_LIMIT)
}

/// Validated page coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: usize,
    pub size: usize,
}

impl PageRequest {
    pub fn clamped(page: Option<i64>, size: Option<i64>, default_size: usize) -> Self {
        Self {
            page: clamp_page(page),
            size: clamp_limit(size, default_size),
        }
    }

    /// Zero-based offset `(page - 1) * size`
    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1)).saturating_mul(self.size)
    }

    /// Applies this page to an already-ordered full result list
    pub fn slice<T: Clone>(&self, items: &[T]) -> Vec<T> {
        items
            .iter()
            .skip(self.offset())
            .take(self.size)
            .cloned()
            .collect()
    }
}

/// One page of results plus the pre-pagination total
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub size: usize,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: usize, request: PageRequest) -> Self {
        Self {
            items,
            total,
            page: request.page,
            size: request.size,
        }
    }

    pub fn empty(request: PageRequest) -> Self {
        Self::new(Vec::new(), 0, request)
    }

    /// Number of pages needed to cover `total`
    pub fn page_count(&self) -> usize {
        if self.size == 0 {
            0
        } else {
            self.total.div_ceil(self.size)
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            size: self.size,
        }
    }
}
