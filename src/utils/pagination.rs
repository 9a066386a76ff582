use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct PaginationParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaginationInfo {
    pub current_page: u32,
    pub per_page: u32,
    pub total: usize,
    pub total_pages: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub pagination: PaginationInfo,
}

impl PaginationParams {
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self { page, per_page }
    }

    pub fn get_page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn get_per_page(&self) -> u32 {
        self.per_page.unwrap_or(20).clamp(1, 100)
    }

    pub fn get_offset(&self) -> usize {
        (self.get_page() as usize - 1) * self.get_per_page() as usize
    }

    pub fn get_limit(&self) -> usize {
        self.get_per_page() as usize
    }
}

impl PaginationInfo {
    pub fn new(current_page: u32, per_page: u32, total: usize) -> Self {
        let total_pages = if total == 0 {
            1
        } else {
            total.div_ceil(per_page as usize) as u32
        };

        Self {
            current_page,
            per_page,
            total,
            total_pages,
        }
    }
}

impl<T> PaginatedResponse<T> {
    /// 对已全部加载到内存的列表做分页（CSV 没有 LIMIT/OFFSET）
    pub fn from_all(all: Vec<T>, params: &PaginationParams) -> Self {
        let total = all.len();
        let items = all
            .into_iter()
            .skip(params.get_offset())
            .take(params.get_limit())
            .collect();
        let pagination = PaginationInfo::new(params.get_page(), params.get_per_page(), total);

        Self { items, pagination }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PaginatedResponse<U> {
        PaginatedResponse {
            items: self.items.into_iter().map(f).collect(),
            pagination: self.pagination,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_params() {
        let params = PaginationParams::new(Some(2), Some(10));
        assert_eq!(params.get_page(), 2);
        assert_eq!(params.get_per_page(), 10);
        assert_eq!(params.get_offset(), 10);
        assert_eq!(params.get_limit(), 10);
    }

    #[test]
    fn test_pagination_params_defaults() {
        let params = PaginationParams::new(Some(0), Some(1000));
        assert_eq!(params.get_page(), 1);
        assert_eq!(params.get_per_page(), 100);
        assert_eq!(params.get_offset(), 0);
    }

    #[test]
    fn test_from_all_slices_page() {
        let params = PaginationParams::new(Some(3), Some(10));
        let page = PaginatedResponse::from_all((0..25).collect::<Vec<_>>(), &params);
        assert_eq!(page.items, vec![20, 21, 22, 23, 24]);
        assert_eq!(page.pagination.total, 25);
        assert_eq!(page.pagination.total_pages, 3);

        let beyond = PaginatedResponse::from_all((0..5).collect::<Vec<_>>(), &params);
        assert!(beyond.items.is_empty());
        assert_eq!(beyond.pagination.total_pages, 1);
    }
}
