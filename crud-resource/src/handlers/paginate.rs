//! Page windows for index requests
//!
//! `page` is 1-based and defaults to 1; `per_page` defaults to
//! [`PaginationConfig::default_per_page`] and may not exceed
//! [`PaginationConfig::max_per_page`].

use serde_json::Value;

use super::error::ApiError;
use super::response::{ListResponse, PaginationMeta};
use super::traits::QueryParams;
use crate::config::PaginationConfig;
use crate::model::Model;
use crate::repository::{Pagination, Query, Session};
use crate::schema::Schema;
use crate::validation::{FieldError, ValidationError};

/// Query parameter naming the page
pub const PAGE_PARAM: &str = "page";

/// Query parameter naming the page size
pub const PER_PAGE_PARAM: &str = "per_page";

/// A validated page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Page number (1-indexed)
    pub page: u32,
    /// Items per page
    pub per_page: u32,
}

fn parse_positive(
    params: &QueryParams,
    name: &str,
    max: u32,
    errors: &mut Vec<FieldError>,
) -> Option<u32> {
    let raw = params.get(name)?.trim();
    let Ok(n) = raw.parse::<i64>() else {
        errors.push(FieldError::new(
            name,
            "INVALID_TYPE",
            format!("{} must be an integer, got '{}'", name, raw),
        ));
        return None;
    };
    if n < 1 {
        errors.push(FieldError::new(
            name,
            "TOO_SMALL",
            format!("{} must be at least 1", name),
        ));
        return None;
    }
    match u32::try_from(n) {
        Ok(n) if n <= max => Some(n),
        _ => {
            errors.push(FieldError::new(
                name,
                "TOO_LARGE",
                format!("{} must be at most {}", name, max),
            ));
            None
        }
    }
}

impl PageRequest {
    /// Validate and parse `page` and `per_page`
    ///
    /// ```rust
    /// use crud_resource::config::PaginationConfig;
    /// use crud_resource::handlers::{PageRequest, QueryParams};
    ///
    /// let mut params = QueryParams::new();
    /// params.insert("page".into(), "3".into());
    ///
    /// let request = PageRequest::from_params(&params, &PaginationConfig::default()).unwrap();
    /// assert_eq!(request.per_page, 20);
    /// assert_eq!(request.offset(), 40);
    /// ```
    pub fn from_params(
        params: &QueryParams,
        config: &PaginationConfig,
    ) -> Result<Self, ValidationError> {
        let mut errors = Vec::new();
        let page = parse_positive(params, PAGE_PARAM, u32::MAX, &mut errors);
        let per_page = parse_positive(params, PER_PAGE_PARAM, config.max_per_page, &mut errors);

        if !errors.is_empty() {
            return Err(ValidationError { errors });
        }

        Ok(Self {
            page: page.unwrap_or(1),
            per_page: per_page.unwrap_or(config.default_per_page),
        })
    }

    /// Number of items before this page
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.per_page)
    }

    /// Window for the repository query
    pub fn window(&self) -> Pagination {
        Pagination::page(u64::from(self.page), u64::from(self.per_page))
    }
}

/// Count, window, fetch and dump one page of `query`
///
/// The total counts every match of the query's filters, not just this page.
pub async fn paginate<M, S>(
    session: &mut S,
    query: Query,
    request: PageRequest,
    schema: &dyn Schema<M>,
) -> Result<ListResponse<Value>, ApiError>
where
    M: Model,
    S: Session<M>,
{
    let total = session.count(&query).await?;
    let entities = session.fetch(&query.paginate(request.window())).await?;
    let items = schema.dump_many(&entities)?;

    Ok(ListResponse::new(
        items,
        PaginationMeta::new(request.page, request.per_page, total),
    ))
}
