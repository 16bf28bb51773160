//! API handlers.

pub mod accounts;
pub mod conversions;
pub mod credits;
pub mod health;
pub mod styles;

use serde::Deserialize;

/// Pagination query parameters shared by list endpoints.
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    /// Maximum number of items to return (default: 50, capped at 100).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Offset for pagination (default: 0).
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

impl PageQuery {
    /// The effective page size.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit.min(100)
    }
}

/// Split a `limit + 1` fetch into a page and a `has_more` flag.
pub(crate) fn paginate<T>(mut items: Vec<T>, limit: usize) -> (Vec<T>, bool) {
    let has_more = items.len() > limit;
    items.truncate(limit);
    (items, has_more)
}
