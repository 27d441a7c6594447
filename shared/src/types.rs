//! Common types used across the platform

use serde::{Deserialize, Serialize};

use crate::models::{LaybuyStatus, OrderStatus, PaymentStatus};

/// Pagination parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Pagination {
    /// Number of records to skip
    pub fn offset(&self) -> usize {
        (self.page.max(1) as usize - 1) * self.per_page as usize
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 20,
        }
    }
}

/// Paginated response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub total_pages: u32,
}

impl PaginationMeta {
    pub fn new(pagination: &Pagination, total_items: u64) -> Self {
        let per_page = pagination.per_page.max(1);
        Self {
            page: pagination.page.max(1),
            per_page,
            total_items,
            total_pages: total_items.div_ceil(per_page as u64) as u32,
        }
    }
}

/// Filter for order listings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderFilter {
    pub order_status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub laybuy_status: Option<LaybuyStatus>,
    pub is_laybuy: Option<bool>,
}
