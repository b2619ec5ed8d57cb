use serde::{Deserialize, Serialize};

pub mod badge;
pub mod leaderboard;
pub mod points;
pub mod stats;
pub mod streak;
pub mod user;

#[inline]
const fn default_page() -> i64 {
    0
}

#[inline]
const fn default_limit() -> i64 {
    50
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default = "default_page")]
    pub page: i64,
}

impl Pagination {
    pub fn offset(&self) -> i64 {
        self.page * self.limit
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub total_items: i64,
    pub total_pages: i64,
    pub page_size: i64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total_items: i64, page_size: i64, page: i64) -> Self {
        let total_pages = if page_size > 0 {
            (total_items as f64 / page_size as f64).ceil() as i64
        } else {
            0
        };

        Self {
            items,
            page,
            page_size,
            total_items,
            total_pages,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn paginated_response_rounds_pages_up() {
        let resp = PaginatedResponse::new(vec![1, 2, 3], 101, 50, 0);
        assert_eq!(resp.total_pages, 3);
        assert_eq!(resp.total_items, 101);
    }

    #[test]
    fn pagination_offset_is_page_times_limit() {
        let p = Pagination { limit: 20, page: 3 };
        assert_eq!(p.offset(), 60);
    }
}
