//! # crud-resource
//!
//! Generic REST CRUD resources for axum. A [`CrudResource`](handlers::CrudResource)
//! binds a [`Model`](model::Model) to a persistence [`Engine`](repository::Engine)
//! and serves index, get, post, put and delete for it, with body validation,
//! sorting, filtering and pagination.
//!
//! ## Features
//!
//! - **Resources**: one builder call per model, mounted as an axum `Router`
//! - **Validation**: declarative per-field [`Rules`](validation::Rules)
//! - **Index shaping**: `sort`/`order`, `page`/`per_page` and `filter` query parameters
//! - **Soft deletes**: models with an `active` column are deactivated, not removed
//! - **Persistence**: in-memory engine, or PostgreSQL with the `database` feature
//! - **Ambient stack**: figment configuration, JSON tracing, request IDs, graceful shutdown
//!
//! ## Example
//!
//! ```rust,no_run
//! use crud_resource::prelude::*;
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize)]
//! struct Item {
//!     id: Option<i64>,
//!     attribute1: String,
//!     active: bool,
//! }
//!
//! impl Model for Item {
//!     const NAME: &'static str = "Item";
//!     const TABLE: &'static str = "items";
//!     const COLUMNS: &'static [&'static str] = &["id", "attribute1", "active"];
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config)?;
//!
//!     let items = CrudResource::builder(MemoryEngine::<Item>::new())
//!         .route_base("/items")
//!         .pagination(config.pagination)
//!         .build();
//!
//!     Server::new(config).serve(items.router()).await
//! }
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod model;
pub mod observability;
pub mod repository;
pub mod schema;
pub mod server;
pub mod validation;

#[cfg(feature = "database")]
pub mod database;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{Config, DatabaseConfig, PaginationConfig};
    pub use crate::error::{Error, Result};

    pub use crate::handlers::{
        collection_router, ApiError, ApiErrorKind, ApiOperation, CollectionHandler, CrudResource,
        ItemResponse, ListResponse, PaginationMeta, QueryParams, ResourceConfig,
    };
    pub use crate::model::Model;
    pub use crate::observability::init_tracing;
    pub use crate::repository::{
        Engine, FilterCondition, FilterOperator, FilterValue, MemoryEngine, OrderDirection, Query,
        RepositoryError, Session,
    };
    pub use crate::schema::{FieldSchema, Schema, SerdeSchema};
    pub use crate::server::Server;
    pub use crate::validation::{Check, FieldError, Rule, Rules, ValueKind};

    #[cfg(feature = "database")]
    pub use crate::database::create_pool;

    #[cfg(feature = "database")]
    pub use crate::repository::PgEngine;

    pub use axum::Router;
    pub use serde::{Deserialize, Serialize};
    pub use tracing::{debug, error, info, instrument, trace, warn};
}
