//! Axum routes for a [`CollectionHandler`]
//!
//! | Method | Path | Handler |
//! |---|---|---|
//! | GET | `{base}` | [`CollectionHandler::index`] |
//! | POST | `{base}` | [`CollectionHandler::post`] |
//! | GET | `{base}/{id}` | [`CollectionHandler::get`] |
//! | PUT | `{base}/{id}` | [`CollectionHandler::put`] |
//! | DELETE | `{base}/{id}` | [`CollectionHandler::delete`] |

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Path, Query, State},
    routing::get,
    Router,
};
use serde_json::Value;

use super::error::{ApiError, ApiOperation};
use super::response::{ItemResponse, ListResponse};
use super::traits::{CollectionHandler, QueryParams};
use crate::validation::FieldError;

/// Mount `handler` at its route base
///
/// ```rust,ignore
/// let app = Router::new()
///     .merge(collection_router(items))
///     .merge(collection_router(notes));
/// ```
pub fn collection_router<H: CollectionHandler>(handler: H) -> Router {
    let base = handler.route_base().trim_end_matches('/').to_string();
    let collection = if base.is_empty() { "/".to_string() } else { base.clone() };
    let item = format!("{}/{{id}}", base);

    Router::new()
        .route(&collection, get(index::<H>).post(post::<H>))
        .route(&item, get(get_one::<H>).put(put::<H>).delete(delete::<H>))
        .with_state(handler)
}

/// Decode a request body; an empty body decodes to `null`
fn parse_body(body: &Bytes, operation: ApiOperation) -> Result<Value, ApiError> {
    if body.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body).map_err(|e| {
        ApiError::validation_failed(
            operation,
            vec![FieldError::new("body", "INVALID_JSON", e.to_string())],
        )
    })
}

/// Report an undecodable query string in the JSON error envelope
fn query_rejected(rejection: &QueryRejection) -> ApiError {
    ApiError::validation_failed(
        ApiOperation::Index,
        vec![FieldError::new("query", "INVALID_QUERY", rejection.body_text())],
    )
}

async fn index<H: CollectionHandler>(
    State(handler): State<H>,
    query: Result<Query<QueryParams>, QueryRejection>,
) -> Result<ListResponse<Value>, ApiError> {
    let Query(params) = query.map_err(|rejection| query_rejected(&rejection))?;
    handler.index(params).await
}

async fn get_one<H: CollectionHandler>(
    State(handler): State<H>,
    Path(id): Path<String>,
) -> Result<ItemResponse, ApiError> {
    handler.get(id).await
}

async fn post<H: CollectionHandler>(
    State(handler): State<H>,
    body: Bytes,
) -> Result<ItemResponse, ApiError> {
    let body = parse_body(&body, ApiOperation::Post)?;
    handler.post(body).await
}

async fn put<H: CollectionHandler>(
    State(handler): State<H>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<ItemResponse, ApiError> {
    let body = parse_body(&body, ApiOperation::Put)?;
    handler.put(id, body).await
}

async fn delete<H: CollectionHandler>(
    State(handler): State<H>,
    Path(id): Path<String>,
) -> Result<ItemResponse, ApiError> {
    handler.delete(id).await
}
