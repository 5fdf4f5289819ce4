use serde::Serialize;

pub const MAX_LIMIT: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub total: usize,
    pub page: usize,
    pub limit: usize,
    pub pages: usize,
}

/// Slices one page out of `items`. Pages are 1-based; `limit` is clamped to
/// `1..=MAX_LIMIT` and falls back to `default_limit`.
pub fn paginate<T>(items: Vec<T>, page: Option<usize>, limit: Option<usize>, default_limit: usize) -> (Vec<T>, Pagination) {
    let limit = limit.filter(|l| *l > 0).unwrap_or(default_limit).min(MAX_LIMIT);
    let page = page.filter(|p| *p > 0).unwrap_or(1);
    let total = items.len();
    let pages = total.div_ceil(limit);
    let slice = items
        .into_iter()
        .skip((page - 1).saturating_mul(limit))
        .take(limit)
        .collect();
    (slice, Pagination { total, page, limit, pages })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slices_requested_page() {
        let (items, meta) = paginate((1..=25).collect::<Vec<_>>(), Some(3), Some(10), 50);
        assert_eq!(items, vec![21, 22, 23, 24, 25]);
        assert_eq!(meta, Pagination { total: 25, page: 3, limit: 10, pages: 3 });
    }

    #[test]
    fn clamps_limit_and_defaults_page() {
        let (items, meta) = paginate((0..500).collect::<Vec<_>>(), Some(0), Some(1000), 50);
        assert_eq!(items.len(), MAX_LIMIT);
        assert_eq!(meta.page, 1);
        assert_eq!(meta.pages, 3);

        let (items, meta) = paginate(Vec::<u8>::new(), None, None, 10);
        assert!(items.is_empty());
        assert_eq!(meta.pages, 0);
    }
}
