//! Response types for resource handlers
//!
//! [`ItemResponse`] carries one dumped entity (or a message) with its
//! status; [`ListResponse`] is the paginated envelope returned by index.
//!
//! # Example
//!
//! ```rust
//! use crud_resource::handlers::{ListResponse, PaginationMeta};
//!
//! let response = ListResponse::new(vec![1, 2, 3], PaginationMeta::new(1, 20, 3));
//! assert_eq!(response.items.len(), 3);
//! assert!(!response.pagination.has_next);
//! ```

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Message returned by a successful delete
pub const DELETED_MESSAGE: &str = "Successfully deleted item";

/// One entity (or message) with its status and optional `Location`
#[derive(Debug, Clone, PartialEq)]
pub struct ItemResponse {
    /// HTTP status
    pub status: StatusCode,
    /// JSON body
    pub body: Value,
    /// `Location` header, set for created entities
    pub location: Option<String>,
}

impl ItemResponse {
    /// 200 with a body
    pub fn ok(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body,
            location: None,
        }
    }

    /// 201 pointing at the new entity
    pub fn created(body: Value, location: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CREATED,
            body,
            location: Some(location.into()),
        }
    }

    /// 204 with the deletion message
    ///
    /// HTTP/1.1 peers may drop the body of a 204.
    pub fn deleted() -> Self {
        Self {
            status: StatusCode::NO_CONTENT,
            body: json!({ "message": DELETED_MESSAGE }),
            location: None,
        }
    }
}

impl IntoResponse for ItemResponse {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.body)).into_response();
        if let Some(location) = self.location {
            match HeaderValue::from_str(&location) {
                Ok(value) => {
                    response.headers_mut().insert(header::LOCATION, value);
                }
                Err(e) => tracing::warn!(%location, error = %e, "invalid Location header"),
            }
        }
        response
    }
}

/// Pagination metadata for list responses
///
/// ```rust
/// use crud_resource::handlers::PaginationMeta;
///
/// let pagination = PaginationMeta::new(1, 20, 100);
/// assert_eq!(pagination.total_pages, 5);
/// assert!(pagination.has_next);
/// assert!(!pagination.has_prev);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaginationMeta {
    /// Current page number (1-indexed)
    pub page: u32,
    /// Number of items per page
    pub per_page: u32,
    /// Total number of items across all pages
    pub total: u64,
    /// Total number of pages
    pub total_pages: u32,
    /// Whether there is a next page
    pub has_next: bool,
    /// Whether there is a previous page
    pub has_prev: bool,
}

impl PaginationMeta {
    /// Create new pagination metadata
    ///
    /// Automatically calculates `total_pages`, `has_next`, and `has_prev`.
    #[must_use]
    pub fn new(page: u32, per_page: u32, total: u64) -> Self {
        let per_page = if per_page == 0 { 1 } else { per_page };
        let total_pages = calculate_total_pages(total, per_page);
        let has_next = page < total_pages;
        let has_prev = page > 1;

        Self {
            page,
            per_page,
            total,
            total_pages,
            has_next,
            has_prev,
        }
    }
}

/// Calculate total pages, rounding up
fn calculate_total_pages(total: u64, per_page: u32) -> u32 {
    let per_page = u64::from(per_page);
    let pages = total.saturating_add(per_page).saturating_sub(1) / per_page;
    pages.min(u64::from(u32::MAX)) as u32
}

/// Paginated envelope: `{"items": [...], "pagination": {...}}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse<T> {
    /// Items on this page
    pub items: Vec<T>,
    /// Pagination metadata
    pub pagination: PaginationMeta,
}

impl<T> ListResponse<T> {
    /// Create a new list response
    pub fn new(items: Vec<T>, pagination: PaginationMeta) -> Self {
        Self { items, pagination }
    }

    /// Map each item in the list to a new type
    pub fn map<U, F>(self, f: F) -> ListResponse<U>
    where
        F: FnMut(T) -> U,
    {
        ListResponse {
            items: self.items.into_iter().map(f).collect(),
            pagination: self.pagination,
        }
    }
}

impl<T: Serialize> IntoResponse for ListResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn test_pagination_meta_first_page() {
        let meta = PaginationMeta::new(1, 20, 100);
        assert_eq!(meta.total_pages, 5);
        assert!(meta.has_next);
        assert!(!meta.has_prev);
    }

    #[test]
    fn test_pagination_meta_last_page() {
        let meta = PaginationMeta::new(3, 20, 50);
        assert_eq!(meta.total_pages, 3);
        assert!(!meta.has_next);
        assert!(meta.has_prev);
    }

    #[test]
    fn test_pagination_meta_empty() {
        let meta = PaginationMeta::new(1, 20, 0);
        assert_eq!(meta.total_pages, 0);
        assert!(!meta.has_next);
        assert!(!meta.has_prev);
    }

    #[test]
    fn test_pagination_meta_page_past_end() {
        let meta = PaginationMeta::new(9, 10, 15);
        assert_eq!(meta.total_pages, 2);
        assert!(!meta.has_next);
        assert!(meta.has_prev);
    }

    #[test]
    fn test_calculate_total_pages() {
        assert_eq!(calculate_total_pages(0, 20), 0);
        assert_eq!(calculate_total_pages(1, 20), 1);
        assert_eq!(calculate_total_pages(20, 20), 1);
        assert_eq!(calculate_total_pages(21, 20), 2);
        assert_eq!(calculate_total_pages(u64::MAX, 1), u32::MAX);
    }

    #[test]
    fn test_list_response_map() {
        let response = ListResponse::new(vec![1, 2], PaginationMeta::new(1, 20, 2));
        let mapped = response.map(|n| n * 10);
        assert_eq!(mapped.items, vec![10, 20]);
    }

    #[test]
    fn test_list_response_shape() {
        let response = ListResponse::new(vec!["a"], PaginationMeta::new(1, 20, 1));
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["items"], json!(["a"]));
        assert_eq!(value["pagination"]["per_page"], 20);
        assert_eq!(value["pagination"]["has_prev"], false);
    }

    #[tokio::test]
    async fn test_created_sets_location() {
        let response = ItemResponse::created(json!({"id": 1}), "/items/1").into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[header::LOCATION], "/items/1");

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body, json!({"id": 1}));
    }

    #[test]
    fn test_deleted() {
        let response = ItemResponse::deleted();
        assert_eq!(response.status, StatusCode::NO_CONTENT);
        assert_eq!(response.body["message"], DELETED_MESSAGE);
    }
}
