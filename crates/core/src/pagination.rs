//! Page-number pagination for feeds.
//!
//! Page selection is forgiving: a missing or non-numeric page number
//! selects the first page, and a number outside `1..=num_pages` selects
//! the last one. An empty feed still has exactly one (empty) page.

use serde::Serialize;

/// Number of posts shown on one feed page.
pub const POSTS_PER_PAGE: u64 = 10;

/// A resolved page position inside a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page number.
    pub number: u64,
    /// Total number of pages (at least 1).
    pub num_pages: u64,
    /// Total number of items.
    pub count: u64,
    /// Items per page.
    pub per_page: u64,
}

impl PageRequest {
    /// Resolve the raw `page` query value against `count` items.
    #[must_use]
    pub fn resolve(count: u64, per_page: u64, raw: Option<&str>) -> Self {
        let per_page = per_page.max(1);
        let num_pages = count.div_ceil(per_page).max(1);

        let number = match raw.map(str::trim).map(str::parse::<i64>) {
            None | Some(Err(_)) => 1,
            Some(Ok(n)) if n >= 1 && n.unsigned_abs() <= num_pages => n.unsigned_abs(),
            Some(Ok(_)) => num_pages,
        };

        Self {
            number,
            num_pages,
            count,
            per_page,
        }
    }

    /// Offset of the first item on this page.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        (self.number - 1) * self.per_page
    }

    /// Maximum number of items on this page.
    #[must_use]
    pub const fn limit(&self) -> u64 {
        self.per_page
    }
}

/// One page of items plus navigation data.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// 1-based page number.
    pub number: u64,
    /// Total number of pages.
    pub num_pages: u64,
    /// Total number of items across all pages.
    pub count: u64,
}

impl<T> Page<T> {
    /// Build a page from its resolved position and items.
    #[must_use]
    pub const fn new(request: PageRequest, items: Vec<T>) -> Self {
        Self {
            items,
            number: request.number,
            num_pages: request.num_pages,
            count: request.count,
        }
    }

    /// Whether a following page exists.
    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    /// Whether a preceding page exists.
    #[must_use]
    pub const fn has_previous(&self) -> bool {
        self.number > 1
    }

    /// Whether there is more than one page.
    #[must_use]
    pub const fn has_other_pages(&self) -> bool {
        self.num_pages > 1
    }

    /// Transform the items while keeping the page position.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            number: self.number,
            num_pages: self.num_pages,
            count: self.count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn number(count: u64, raw: Option<&str>) -> u64 {
        PageRequest::resolve(count, POSTS_PER_PAGE, raw).number
    }

    #[test]
    fn test_missing_page_is_first() {
        assert_eq!(number(35, None), 1);
    }

    #[test]
    fn test_non_integer_page_is_first() {
        assert_eq!(number(35, Some("abc")), 1);
        assert_eq!(number(35, Some("")), 1);
        assert_eq!(number(35, Some("2.5")), 1);
    }

    #[test]
    fn test_out_of_range_page_is_last() {
        assert_eq!(number(35, Some("0")), 4);
        assert_eq!(number(35, Some("-3")), 4);
        assert_eq!(number(35, Some("99")), 4);
    }

    #[test]
    fn test_in_range_page() {
        assert_eq!(number(35, Some("2")), 2);
        assert_eq!(number(35, Some(" 3 ")), 3);
    }

    #[test]
    fn test_empty_list_has_one_page() {
        let request = PageRequest::resolve(0, POSTS_PER_PAGE, Some("5"));
        assert_eq!(request.num_pages, 1);
        assert_eq!(request.number, 1);
        assert_eq!(request.offset(), 0);
    }

    #[test]
    fn test_exact_multiple() {
        let request = PageRequest::resolve(20, POSTS_PER_PAGE, Some("2"));
        assert_eq!(request.num_pages, 2);
        assert_eq!(request.offset(), 10);
        assert_eq!(request.limit(), 10);
    }

    #[test]
    fn test_page_navigation() {
        let request = PageRequest::resolve(25, POSTS_PER_PAGE, Some("2"));
        let page = Page::new(request, vec![1, 2, 3]);

        assert!(page.has_next());
        assert!(page.has_previous());
        assert!(page.has_other_pages());

        let mapped = page.map(|n| n * 10);
        assert_eq!(mapped.items, vec![10, 20, 30]);
        assert_eq!(mapped.number, 2);
    }
}
