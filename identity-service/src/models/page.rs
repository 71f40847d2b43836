use serde::{Deserialize, Serialize};

pub const DEFAULT_LIMIT: u64 = 10;
pub const MAX_LIMIT: u64 = 100;

/// Offset pagination with an optional case-insensitive name filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub offset: u64,
    pub limit: Option<u64>,
    pub name: Option<String>,
}

impl PageParams {
    /// Limit clamped to `1..=MAX_LIMIT`.
    pub fn limit(&self) -> u64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    /// Slice an already filtered and ordered collection.
    pub fn from_all(all: Vec<T>, params: &PageParams) -> Self {
        let total = all.len() as u64;
        let limit = params.limit();
        let items = all
            .into_iter()
            .skip(params.offset as usize)
            .take(limit as usize)
            .collect();
        Self {
            total,
            offset: params.offset,
            limit,
            items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_is_clamped() {
        assert_eq!(PageParams::default().limit(), DEFAULT_LIMIT);
        let p = PageParams {
            limit: Some(10_000),
            ..Default::default()
        };
        assert_eq!(p.limit(), MAX_LIMIT);
        let p = PageParams {
            limit: Some(0),
            ..Default::default()
        };
        assert_eq!(p.limit(), 1);
    }

    #[test]
    fn test_from_all_slices() {
        let params = PageParams {
            offset: 2,
            limit: Some(2),
            name: None,
        };
        let page = Page::from_all((0..5).collect::<Vec<_>>(), &params);
        assert_eq!(page.total, 5);
        assert_eq!(page.items, vec![2, 3]);
    }
}
