use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

/// Query parameters for local list endpoints.
#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    10
}

impl ListParams {
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.page < 1 {
            return Err(ServiceError::Validation("page must be at least 1".into()));
        }
        if !(1..=100).contains(&self.limit) {
            return Err(ServiceError::Validation(
                "limit must be between 1 and 100".into(),
            ));
        }
        Ok(())
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

/// Pagination block attached to every list response.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub current_page: i64,
    pub total_pages: i64,
    pub total_items: i64,
    pub has_next: bool,
    pub has_previous: bool,
    pub items_per_page: i64,
}

impl PageMeta {
    pub fn new(page: i64, limit: i64, total_items: i64) -> Self {
        let total_pages = if limit > 0 {
            (total_items + limit - 1) / limit
        } else {
            0
        };
        Self {
            current_page: page,
            total_pages,
            total_items,
            has_next: page < total_pages,
            has_previous: page > 1,
            items_per_page: limit,
        }
    }
}

/// Envelope for paginated collections: `{"success": true, "data": [...], "pagination": {...}}`.
#[derive(Debug, Serialize)]
pub struct Paginated<T: Serialize> {
    pub success: bool,
    pub data: Vec<T>,
    pub pagination: PageMeta,
}

impl<T: Serialize> Paginated<T> {
    pub fn new(data: Vec<T>, pagination: PageMeta) -> Self {
        Self {
            success: true,
            data,
            pagination,
        }
    }
}
