use serde::Deserialize;

use crate::error::ApiError;

pub const DEFAULT_PAGE: usize = 1;
pub const DEFAULT_LIMIT: usize = 10;

/// Raw `?page=&limit=` values. Kept as strings so junk never rejects the request.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams {
    pub page: usize,
    pub limit: usize,
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl From<PageQuery> for PageParams {
    /// Non-positive or unparsable values fall back to the defaults.
    fn from(query: PageQuery) -> Self {
        Self {
            page: positive(query.page.as_deref()).unwrap_or(DEFAULT_PAGE),
            limit: positive(query.limit.as_deref()).unwrap_or(DEFAULT_LIMIT),
        }
    }
}

fn positive(raw: Option<&str>) -> Option<usize> {
    raw?.trim().parse::<usize>().ok().filter(|n| *n > 0)
}

/// One slice of a result set, plus the size of the whole set.
#[derive(Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl PageParams {
    /// Slice `[(page-1)*limit, min(page*limit, total))` out of `items`.
    ///
    /// Page 1 always exists, even for an empty set. Any later page must start
    /// inside the set, otherwise the request is a `BadRequest`.
    pub fn apply<T>(self, mut items: Vec<T>) -> Result<Page<T>, ApiError> {
        let total = items.len();
        let start = self.limit.saturating_mul(self.page - 1);

        if self.page > 1 && start >= total {
            return Err(ApiError::BadRequest("requested page does not exist".into()));
        }

        let end = self.limit.saturating_mul(self.page).min(total);
        items.truncate(end);
        items.drain(..start);

        Ok(Page { items, total })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(page: &str, limit: &str) -> PageParams {
        PageQuery {
            page: Some(page.into()),
            limit: Some(limit.into()),
        }
        .into()
    }

    #[test]
    fn junk_and_non_positive_values_fall_back_to_defaults() {
        assert_eq!(PageParams::from(PageQuery::default()), PageParams::default());
        assert_eq!(params("0", "-5"), PageParams::default());
        assert_eq!(params("two", ""), PageParams::default());
        assert_eq!(params("3", "25"), PageParams { page: 3, limit: 25 });
    }

    #[test]
    fn slices_pages_and_reports_total() {
        let items: Vec<u32> = (0..25).collect();

        let first = params("1", "10").apply(items.clone()).unwrap();
        assert_eq!(first.items, (0..10).collect::<Vec<_>>());
        assert_eq!(first.total, 25);

        let last = params("3", "10").apply(items.clone()).unwrap();
        assert_eq!(last.items, (20..25).collect::<Vec<_>>());
        assert_eq!(last.total, 25);
    }

    #[test]
    fn page_length_matches_remaining_items() {
        for n in 0..30usize {
            for limit in 1..8usize {
                for page in 1..10usize {
                    let offset = limit * (page - 1);
                    let result = PageParams { page, limit }.apply((0..n).collect::<Vec<_>>());
                    if page > 1 && offset >= n {
                        assert!(matches!(result, Err(ApiError::BadRequest(_))));
                    } else {
                        let page = result.unwrap();
                        assert_eq!(page.items.len(), limit.min(n - offset));
                        assert_eq!(page.total, n);
                    }
                }
            }
        }
    }

    #[test]
    fn first_page_of_empty_set_is_empty_not_an_error() {
        let page = PageParams::default().apply(Vec::<u8>::new()).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, 0);
    }

    #[test]
    fn page_past_the_end_is_rejected() {
        let items: Vec<u8> = vec![1, 2, 3, 4];
        assert!(params("3", "2").apply(items.clone()).is_err());
        assert!(params("5", "1").apply(items.clone()).is_err());
        assert!(params("2", "3").apply(items).is_ok());
    }

    #[test]
    fn huge_limits_do_not_overflow() {
        let items: Vec<u8> = vec![1, 2, 3];
        let page = PageParams { page: 1, limit: usize::MAX }.apply(items.clone()).unwrap();
        assert_eq!(page.items, items);
        assert!(PageParams { page: usize::MAX, limit: usize::MAX }.apply(items).is_err());
    }
}
