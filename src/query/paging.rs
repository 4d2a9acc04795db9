use crate::core::{MasterError, Result};
use serde::{Deserialize, Serialize};

/// Slice of a result set: skip `first_item`, keep at most `paging_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagingRequest {
    first_item: usize,
    paging_size: usize,
}

impl PagingRequest {
    pub const ALL: PagingRequest = PagingRequest {
        first_item: 0,
        paging_size: usize::MAX,
    };

    /// Counts without returning items.
    pub const NONE: PagingRequest = PagingRequest {
        first_item: 0,
        paging_size: 0,
    };

    pub const ONE: PagingRequest = PagingRequest {
        first_item: 0,
        paging_size: 1,
    };

    /// One-based page number.
    pub fn of_page(page: usize, per_page: usize) -> Result<Self> {
        if page == 0 || per_page == 0 {
            return Err(MasterError::invalid(format!(
                "Page and page size must be positive: page {} of size {}",
                page, per_page
            )));
        }
        Ok(Self {
            first_item: (page - 1).saturating_mul(per_page),
            paging_size: per_page,
        })
    }

    pub fn of_index(first_item: usize, paging_size: usize) -> Self {
        Self {
            first_item,
            paging_size,
        }
    }

    pub fn first_item(&self) -> usize {
        self.first_item
    }

    pub fn paging_size(&self) -> usize {
        self.paging_size
    }

    pub fn select<T>(&self, items: Vec<T>) -> Page<T> {
        let total_items = items.len();
        let items = items
            .into_iter()
            .skip(self.first_item)
            .take(self.paging_size)
            .collect();
        Page {
            items,
            paging: Paging {
                first_item: self.first_item,
                paging_size: self.paging_size,
                total_items,
            },
        }
    }
}

impl Default for PagingRequest {
    fn default() -> Self {
        Self::ALL
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paging {
    pub first_item: usize,
    pub paging_size: usize,
    pub total_items: usize,
}

impl Paging {
    pub fn total_pages(&self) -> usize {
        match self.paging_size {
            0 => 0,
            size => self.total_items.div_ceil(size),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub paging: Paging,
}

impl<T> Page<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total(&self) -> usize {
        self.paging.total_items
    }

    pub fn first(&self) -> Option<&T> {
        self.items.first()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            paging: self.paging,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_of_page_slices_and_reports_total() {
        let page = PagingRequest::of_page(1, 2).unwrap().select(vec![1, 2, 3]);
        assert_eq!(page.items, vec![1, 2]);
        assert_eq!(page.total(), 3);
        assert_eq!(page.paging.total_pages(), 2);

        let second = PagingRequest::of_page(2, 2).unwrap().select(vec![1, 2, 3]);
        assert_eq!(second.items, vec![3]);
    }

    #[test]
    fn test_index_past_end_is_empty_but_counted() {
        let page = PagingRequest::of_index(3, 2).select(vec![1, 2, 3]);
        assert!(page.is_empty());
        assert_eq!(page.total(), 3);
    }

    #[test]
    fn test_none_counts_only() {
        let page = PagingRequest::NONE.select(vec!["a", "b"]);
        assert!(page.is_empty());
        assert_eq!(page.total(), 2);
        assert_eq!(page.paging.total_pages(), 0);
    }

    #[test]
    fn test_zero_page_is_invalid() {
        assert!(PagingRequest::of_page(0, 10).is_err());
        assert!(PagingRequest::of_page(1, 0).is_err());
    }
}
