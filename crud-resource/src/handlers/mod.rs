//! REST collections over persisted models
//!
//! [`CrudResource`] serves index, get, post, put and delete for one
//! [`Model`](crate::model::Model) through a persistence
//! [`Engine`](crate::repository::Engine). Index requests are shaped by the
//! `sort`/`order`, `page`/`per_page` and `filter` query parameters; see
//! [`SortSpec`], [`PageRequest`] and [`FilterExpression`].
//!
//! # Integration with Axum
//!
//! ```rust,ignore
//! use crud_resource::handlers::CrudResource;
//! use crud_resource::repository::MemoryEngine;
//!
//! let items = CrudResource::builder(MemoryEngine::<Item>::new())
//!     .route_base("/items")
//!     .build();
//!
//! let app = axum::Router::new().merge(items.router());
//! ```
//!
//! Any other [`CollectionHandler`] can be mounted with [`collection_router`].

mod error;
mod filter;
mod paginate;
mod resource;
mod response;
mod router;
mod sort;
mod traits;

pub use error::{ApiError, ApiErrorKind, ApiErrorResponse, ApiOperation};
pub use filter::{coerce, FilterExpression, FILTER_PARAM};
pub use paginate::{paginate, PageRequest, PAGE_PARAM, PER_PAGE_PARAM};
pub use resource::{CrudResource, CrudResourceBuilder, ResourceConfig};
pub use response::{ItemResponse, ListResponse, PaginationMeta, DELETED_MESSAGE};
pub use router::collection_router;
pub use sort::{SortSpec, ORDER_PARAM, SORT_PARAM};
pub use traits::{CollectionHandler, QueryParams};
