//! Handler trait for REST collections
//!
//! Uses RPITIT (Return Position Impl Trait In Traits) for async methods,
//! available since Rust 1.75.
//!
//! Any [`CollectionHandler`] can be mounted with
//! [`collection_router`](super::collection_router); [`CrudResource`](super::CrudResource)
//! is the implementation bound to a model and a persistence engine.

use std::collections::BTreeMap;
use std::future::Future;

use serde_json::Value;

use super::error::ApiError;
use super::response::{ItemResponse, ListResponse};

/// Decoded query string of an index request
pub type QueryParams = BTreeMap<String, String>;

/// Standard REST collection handler
///
/// Identifiers arrive as the raw path segment; an identifier that does not
/// name an entity (including one that does not parse) is a `NotFound`.
pub trait CollectionHandler: Clone + Send + Sync + 'static {
    /// Path the collection is mounted at, e.g. `/items`
    fn route_base(&self) -> &str;

    /// List one page of the collection
    ///
    /// # Errors
    ///
    /// `ValidationFailed` for bad sort, page or filter parameters.
    fn index(
        &self,
        params: QueryParams,
    ) -> impl Future<Output = Result<ListResponse<Value>, ApiError>> + Send;

    /// Read one entity
    fn get(&self, id: String) -> impl Future<Output = Result<ItemResponse, ApiError>> + Send;

    /// Create an entity from a JSON body
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` if the body breaks the validation rules
    /// - `InternalError` if the commit fails; nothing is persisted
    fn post(&self, body: Value) -> impl Future<Output = Result<ItemResponse, ApiError>> + Send;

    /// Update an entity from a JSON body
    ///
    /// # Errors
    ///
    /// - `NotFound` if the entity doesn't exist
    /// - `ValidationFailed` if the body breaks the validation rules
    /// - `InternalError` if the commit fails; the entity is left unchanged
    fn put(
        &self,
        id: String,
        body: Value,
    ) -> impl Future<Output = Result<ItemResponse, ApiError>> + Send;

    /// Delete an entity, or mark it inactive when the model has an active flag
    fn delete(&self, id: String) -> impl Future<Output = Result<ItemResponse, ApiError>> + Send;
}
