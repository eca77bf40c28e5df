use serde::{Deserialize, Serialize};

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

/// `?page=&size=` query parameters; pages are zero-based
#[derive(Debug, Deserialize, Default)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub size: Option<i64>,
}

impl PageQuery {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(0).max(0)
    }

    pub fn size(&self) -> i64 {
        self.size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        self.page().saturating_mul(self.size())
    }
}

/// `?limit=` for short top-N lists; each route picks its own default
#[derive(Debug, Deserialize, Default)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

impl LimitQuery {
    pub fn limit(&self, default: i64) -> i64 {
        self.limit.unwrap_or(default).clamp(1, MAX_PAGE_SIZE)
    }
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub content: Vec<T>,
    pub total_elements: i64,
    pub total_pages: i64,
    pub current_page: i64,
    pub size: i64,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, total_elements: i64, query: &PageQuery) -> Self {
        let size = query.size();
        Self {
            content,
            total_elements,
            total_pages: (total_elements + size - 1) / size,
            current_page: query.page(),
            size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let query = PageQuery::default();
        assert_eq!(query.page(), 0);
        assert_eq!(query.size(), DEFAULT_PAGE_SIZE);
        assert_eq!(query.offset(), 0);
    }

    #[test]
    fn test_bounds_are_clamped() {
        let query = PageQuery {
            page: Some(-3),
            size: Some(10_000),
        };
        assert_eq!(query.page(), 0);
        assert_eq!(query.size(), MAX_PAGE_SIZE);

        let query = PageQuery {
            page: Some(2),
            size: Some(0),
        };
        assert_eq!(query.size(), 1);
        assert_eq!(query.offset(), 2);
    }

    #[test]
    fn test_limit_query() {
        assert_eq!(LimitQuery::default().limit(10), 10);
        assert_eq!(LimitQuery { limit: Some(5) }.limit(10), 5);
        assert_eq!(LimitQuery { limit: Some(0) }.limit(10), 1);
        assert_eq!(LimitQuery { limit: Some(500) }.limit(10), MAX_PAGE_SIZE);
    }

    #[test]
    fn test_total_pages_rounds_up() {
        let query = PageQuery {
            page: Some(1),
            size: Some(20),
        };
        let page = Page::new(vec![1, 2, 3], 41, &query);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.current_page, 1);

        let empty: Page<i32> = Page::new(vec![], 0, &query);
        assert_eq!(empty.total_pages, 0);
    }
}
