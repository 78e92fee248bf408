use serde::{Deserialize, Serialize};

/// A clamped page/limit pair as parsed from a listing query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    /// `page` is at least 1; `limit` falls back to `default_limit` and is
    /// clamped to `1..=max_limit`.
    pub fn new(page: Option<i64>, limit: Option<i64>, default_limit: i64, max_limit: i64) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(default_limit).clamp(1, max_limit),
        }
    }

    /// Saturates for pages far past the end; they are simply empty.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub has_more: bool,
}

impl Pagination {
    pub fn new(request: PageRequest, total: i64) -> Self {
        Self {
            page: request.page,
            limit: request.limit,
            total,
            has_more: request.offset().saturating_add(request.limit) < total,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total: i64) -> Self {
        Self {
            items,
            pagination: Pagination::new(request, total),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_clamps() {
        assert_eq!(
            PageRequest::new(None, None, 12, 50),
            PageRequest { page: 1, limit: 12 }
        );
        assert_eq!(
            PageRequest::new(Some(0), Some(500), 12, 50),
            PageRequest { page: 1, limit: 50 }
        );
        assert_eq!(
            PageRequest::new(Some(-3), Some(0), 12, 50),
            PageRequest { page: 1, limit: 1 }
        );
        assert_eq!(PageRequest::new(Some(3), Some(10), 12, 50).offset(), 20);
    }

    #[test]
    fn test_has_more() {
        let request = PageRequest::new(Some(1), Some(10), 10, 50);
        assert!(Pagination::new(request, 11).has_more);
        assert!(!Pagination::new(request, 10).has_more);

        let last = PageRequest::new(Some(2), Some(10), 10, 50);
        assert!(!Pagination::new(last, 15).has_more);
    }

    #[test]
    fn test_huge_page_saturates() {
        let request = PageRequest::new(Some(i64::MAX), Some(50), 12, 50);
        assert_eq!(request.offset(), i64::MAX);
        assert!(!Pagination::new(request, 3).has_more);
    }
}
