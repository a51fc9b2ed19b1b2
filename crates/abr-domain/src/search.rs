//! Query and pagination shapes shared by both search paths (native and
//! optimized) and by the HTTP layer that builds them from query parameters.

use serde::{Deserialize, Serialize};

/// A search request: an optional free-text term plus structured filters.
///
/// `term` and the filter fields are `None` when the corresponding query
/// parameter was absent — the controller layer normalizes an absent string
/// parameter to `None`, never to `Some("")`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchQuery {
    pub term: Option<String>,
    pub state: Option<String>,
    pub postcode: Option<String>,
    pub entity_type: Option<String>,
    pub abn_status: Option<String>,
    pub page: u32,
    pub limit: u32,
}

impl SearchQuery {
    /// A term is "present" for dispatch purposes only if it has non-whitespace
    /// content; §4.2.4/§4.2.5 degenerate to `find_with_filters` otherwise.
    pub fn has_term(&self) -> bool {
        self.term.as_deref().is_some_and(|t| !t.trim().is_empty())
    }

    pub fn offset(&self) -> i64 {
        ((self.page.max(1) - 1) as i64) * self.limit as i64
    }
}

/// The pagination envelope returned alongside every search result page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl Pagination {
    /// Builds the pagination envelope from a capped candidate-set size.
    ///
    /// `total` here is already the post-cap value (§4.2.6 step 1); this
    /// function only derives `total_pages` from it.
    pub fn new(page: u32, limit: u32, total: u64) -> Self {
        let total_pages = if limit == 0 {
            0
        } else {
            total.div_ceil(limit as u64)
        };
        Self {
            page,
            limit,
            total,
            total_pages,
        }
    }
}

/// Repository-level timing metadata: how long the store operation itself took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMeta {
    pub query_time_ms: u64,
}

/// One page of search results, as returned by the Repository (before the
/// HTTP layer adds `total_time_ms`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
    pub meta: ResponseMeta,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_rounds_up() {
        let p = Pagination::new(1, 20, 100);
        assert_eq!(p.total_pages, 5);
        let p = Pagination::new(1, 20, 101);
        assert_eq!(p.total_pages, 6);
    }

    #[test]
    fn offset_is_zero_on_first_page() {
        let q = SearchQuery {
            page: 1,
            limit: 20,
            ..Default::default()
        };
        assert_eq!(q.offset(), 0);
        let q = SearchQuery {
            page: 3,
            limit: 20,
            ..Default::default()
        };
        assert_eq!(q.offset(), 40);
    }

    #[test]
    fn has_term_rejects_whitespace() {
        let q = SearchQuery {
            term: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(!q.has_term());
    }
}
