//! Generic CRUD resource
//!
//! [`CrudResource`] binds a [`Model`], a [`Schema`] and a persistence
//! [`Engine`] and serves the five collection verbs for them. Each request
//! opens its own session; mutating verbs commit once and roll back if the
//! commit fails.
//!
//! # Example
//!
//! ```rust
//! use crud_resource::handlers::CrudResource;
//! use crud_resource::model::Model;
//! use crud_resource::repository::MemoryEngine;
//! use crud_resource::validation::{Check, Rule, Rules, ValueKind};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize)]
//! struct Item {
//!     id: Option<i64>,
//!     attribute1: String,
//! }
//!
//! impl Model for Item {
//!     const NAME: &'static str = "Item";
//!     const TABLE: &'static str = "items";
//!     const COLUMNS: &'static [&'static str] = &["id", "attribute1"];
//! }
//!
//! let items = CrudResource::builder(MemoryEngine::<Item>::new())
//!     .route_base("/items")
//!     .body_validation(Rules::new().field(
//!         "attribute1",
//!         Rule::required().check(Check::Type(ValueKind::String)),
//!     ))
//!     .build();
//!
//! let app: axum::Router = items.router();
//! ```

use std::sync::Arc;

use axum::Router;
use serde_json::{Map, Value};

use super::error::{ApiError, ApiOperation};
use super::filter::{FilterExpression, FILTER_PARAM};
use super::paginate::{paginate, PageRequest};
use super::response::{ItemResponse, ListResponse};
use super::router::collection_router;
use super::sort::SortSpec;
use super::traits::{CollectionHandler, QueryParams};
use crate::config::PaginationConfig;
use crate::model::{self, Model};
use crate::repository::{Engine, FilterCondition, Query, RepositoryError, Session};
use crate::schema::{Schema, SerdeSchema};
use crate::validation::{validate, FieldError, Rules, Source, ValidationError};

/// Per-resource settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceConfig {
    /// Path the collection is mounted at
    pub route_base: String,
    /// Column marking an entity active; ignored unless it is a model column
    pub active_field: Option<String>,
    /// Hide inactive entities from index
    pub exclude_inactive: bool,
    /// Page size limits for index
    pub pagination: PaginationConfig,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            route_base: "/".to_string(),
            active_field: Some("active".to_string()),
            exclude_inactive: true,
            pagination: PaginationConfig::default(),
        }
    }
}

struct Inner<M, E> {
    engine: E,
    schema: Arc<dyn Schema<M>>,
    body_validation: Rules,
    index_validation: Option<Rules>,
    config: ResourceConfig,
}

/// REST collection over one model
///
/// Cloning is cheap; clones share the engine and settings.
pub struct CrudResource<M, E> {
    inner: Arc<Inner<M, E>>,
}

impl<M, E> Clone for CrudResource<M, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Builder for [`CrudResource`]
pub struct CrudResourceBuilder<M, E> {
    engine: E,
    schema: Option<Arc<dyn Schema<M>>>,
    body_validation: Rules,
    index_validation: Option<Rules>,
    config: ResourceConfig,
}

impl<M: Model, E: Engine<M>> CrudResourceBuilder<M, E> {
    /// Output schema; defaults to [`SerdeSchema`]
    #[must_use]
    pub fn schema(mut self, schema: impl Schema<M>) -> Self {
        self.schema = Some(Arc::new(schema));
        self
    }

    /// Rules every POST and PUT body must pass
    #[must_use]
    pub fn body_validation(mut self, rules: Rules) -> Self {
        self.body_validation = rules;
        self
    }

    /// Rules the index query string must pass
    #[must_use]
    pub fn index_validation(mut self, rules: Rules) -> Self {
        self.index_validation = Some(rules);
        self
    }

    /// Mount path, e.g. `/items`
    #[must_use]
    pub fn route_base(mut self, route_base: impl Into<String>) -> Self {
        self.config.route_base = route_base.into();
        self
    }

    /// Column used for soft deletes
    #[must_use]
    pub fn active_field(mut self, field: impl Into<String>) -> Self {
        self.config.active_field = Some(field.into());
        self
    }

    /// Always delete physically
    #[must_use]
    pub fn without_active_field(mut self) -> Self {
        self.config.active_field = None;
        self
    }

    /// Whether index hides inactive entities
    #[must_use]
    pub fn exclude_inactive(mut self, exclude: bool) -> Self {
        self.config.exclude_inactive = exclude;
        self
    }

    /// Page size limits for index
    #[must_use]
    pub fn pagination(mut self, pagination: PaginationConfig) -> Self {
        self.config.pagination = pagination;
        self
    }

    /// Replace all settings at once
    #[must_use]
    pub fn config(mut self, config: ResourceConfig) -> Self {
        self.config = config;
        self
    }

    /// Finish the resource
    pub fn build(self) -> CrudResource<M, E> {
        if let Some(field) = &self.config.active_field {
            if !M::has_column(field) {
                tracing::debug!(
                    entity = M::NAME,
                    active_field = %field,
                    "active field is not a column; deletes will be physical"
                );
            }
        }

        CrudResource {
            inner: Arc::new(Inner {
                engine: self.engine,
                schema: self.schema.unwrap_or_else(|| Arc::new(SerdeSchema)),
                body_validation: self.body_validation,
                index_validation: self.index_validation,
                config: self.config,
            }),
        }
    }
}

fn repository_failed(operation: ApiOperation) -> impl Fn(RepositoryError) -> ApiError {
    move |err| ApiError::from(err).with_operation(operation)
}

/// Any failed commit is reported as an internal error, whatever the engine
/// said about it; the cause is only logged
fn commit_failed(entity: &str, err: &RepositoryError, operation: ApiOperation) -> ApiError {
    tracing::error!(
        entity,
        operation = %operation,
        kind = ?err.kind,
        error = %err,
        "commit failed, rolling back"
    );
    ApiError::internal("An internal error occurred").with_operation(operation)
}

fn params_to_value(params: &QueryParams) -> Value {
    Value::Object(
        params
            .iter()
            .map(|(key, value)| (key.clone(), Value::String(value.clone())))
            .collect(),
    )
}

impl<M: Model, E: Engine<M>> CrudResource<M, E> {
    /// Start building a resource over `engine`
    pub fn builder(engine: E) -> CrudResourceBuilder<M, E> {
        CrudResourceBuilder {
            engine,
            schema: None,
            body_validation: Rules::new(),
            index_validation: None,
            config: ResourceConfig::default(),
        }
    }

    /// Resource with default settings
    pub fn new(engine: E) -> Self {
        Self::builder(engine).build()
    }

    /// Settings in effect
    pub fn config(&self) -> &ResourceConfig {
        &self.inner.config
    }

    /// Persistence engine
    pub fn engine(&self) -> &E {
        &self.inner.engine
    }

    /// Axum routes for this resource
    pub fn router(&self) -> Router {
        collection_router(self.clone())
    }

    /// Active column, when the configured one exists on the model
    fn active_column(&self) -> Option<&str> {
        self.inner
            .config
            .active_field
            .as_deref()
            .filter(|field| M::has_column(field))
    }

    fn location(&self, id: Option<i64>) -> String {
        let base = self.inner.config.route_base.trim_end_matches('/');
        match id {
            Some(id) => format!("{}/{}", base, id),
            None if base.is_empty() => "/".to_string(),
            None => base.to_string(),
        }
    }

    async fn begin(&self, operation: ApiOperation) -> Result<E::Session, ApiError> {
        self.inner
            .engine
            .begin()
            .await
            .map_err(repository_failed(operation))
    }

    /// Fetch by raw path id; ids that are not integers are not found
    async fn load(
        &self,
        session: &mut E::Session,
        id: &str,
        operation: ApiOperation,
    ) -> Result<M, ApiError> {
        let not_found = || ApiError::not_found(M::NAME, id).with_operation(operation);
        let Ok(key) = id.parse::<i64>() else {
            return Err(not_found());
        };
        session
            .get(key)
            .await
            .map_err(repository_failed(operation))?
            .ok_or_else(not_found)
    }

    /// Commit, rolling back on failure
    ///
    /// Always a 500 on failure, even when the rollback fails too.
    async fn commit(&self, session: &mut E::Session, operation: ApiOperation) -> Result<(), ApiError> {
        let Err(err) = session.commit().await else {
            return Ok(());
        };

        let failed = commit_failed(M::NAME, &err, operation);
        if let Err(rollback_err) = session.rollback().await {
            tracing::error!(
                entity = M::NAME,
                operation = %operation,
                error = %rollback_err,
                "rollback failed"
            );
        }
        Err(failed)
    }

    fn validate_body<'a>(
        &self,
        body: &'a Value,
        operation: ApiOperation,
    ) -> Result<&'a Map<String, Value>, ApiError> {
        validate(Source::Body, body, &self.inner.body_validation)
            .map_err(|err| ApiError::from(err).with_operation(operation))?;
        body.as_object().ok_or_else(|| {
            ApiError::validation_failed(
                operation,
                vec![FieldError::new("body", "INVALID_BODY", "body must be a JSON object")],
            )
        })
    }

    fn dump(&self, entity: &M, operation: ApiOperation) -> Result<Value, ApiError> {
        self.inner
            .schema
            .dump(entity)
            .map_err(|err| err.with_operation(operation))
    }

    /// Unfiltered query narrowed by the `filter` parameter and the active flag
    fn base_query(&self, params: &QueryParams) -> Result<Query, ValidationError> {
        let mut query = Query::new();
        if let Some(expression) = params.get(FILTER_PARAM) {
            query = FilterExpression::parse::<M>(expression)?.apply(query);
        }
        if self.inner.config.exclude_inactive {
            if let Some(active) = self.active_column() {
                query = query.filter(FilterCondition::eq(active, true));
            }
        }
        Ok(query)
    }
}

impl<M: Model, E: Engine<M>> CollectionHandler for CrudResource<M, E> {
    fn route_base(&self) -> &str {
        &self.inner.config.route_base
    }

    async fn index(&self, params: QueryParams) -> Result<ListResponse<Value>, ApiError> {
        let operation = ApiOperation::Index;
        let reject = |err: ValidationError| ApiError::from(err).with_operation(operation);

        let sort = SortSpec::from_params::<M>(&params).map_err(reject)?;
        let page = PageRequest::from_params(&params, &self.inner.config.pagination).map_err(reject)?;
        if let Some(rules) = &self.inner.index_validation {
            validate(Source::Query, &params_to_value(&params), rules).map_err(reject)?;
        }
        let query = sort.apply::<M>(self.base_query(&params).map_err(reject)?);

        let mut session = self.begin(operation).await?;
        let response = paginate::<M, _>(&mut session, query, page, self.inner.schema.as_ref())
            .await
            .map_err(|err| err.with_operation(operation))?;

        tracing::debug!(
            entity = M::NAME,
            page = page.page,
            per_page = page.per_page,
            returned = response.items.len(),
            total = response.pagination.total,
            "listed entities"
        );
        Ok(response)
    }

    async fn get(&self, id: String) -> Result<ItemResponse, ApiError> {
        let operation = ApiOperation::Get;
        let mut session = self.begin(operation).await?;
        let entity = self.load(&mut session, &id, operation).await?;
        Ok(ItemResponse::ok(self.dump(&entity, operation)?))
    }

    async fn post(&self, body: Value) -> Result<ItemResponse, ApiError> {
        let operation = ApiOperation::Post;
        let payload = self.validate_body(&body, operation)?;
        let entity = model::assign_fields(M::default(), payload)
            .map_err(|err| ApiError::from(err).with_operation(operation))?;

        let mut session = self.begin(operation).await?;
        let entity = session
            .add(entity)
            .await
            .map_err(repository_failed(operation))?;
        self.commit(&mut session, operation).await?;

        let id = model::primary_key(&entity);
        tracing::info!(entity = M::NAME, id = ?id, "created entity");
        let body = self.dump(&entity, operation)?;
        Ok(ItemResponse::created(body, self.location(id)))
    }

    async fn put(&self, id: String, body: Value) -> Result<ItemResponse, ApiError> {
        let operation = ApiOperation::Put;
        let mut session = self.begin(operation).await?;
        let existing = self.load(&mut session, &id, operation).await?;

        let payload = self.validate_body(&body, operation)?;
        let entity = model::assign_fields(existing, payload)
            .map_err(|err| ApiError::from(err).with_operation(operation))?;
        let entity = session
            .merge(entity)
            .await
            .map_err(repository_failed(operation))?;
        self.commit(&mut session, operation).await?;

        tracing::info!(entity = M::NAME, id = %id, "updated entity");
        Ok(ItemResponse::ok(self.dump(&entity, operation)?))
    }

    async fn delete(&self, id: String) -> Result<ItemResponse, ApiError> {
        let operation = ApiOperation::Delete;
        let mut session = self.begin(operation).await?;
        let entity = self.load(&mut session, &id, operation).await?;

        match self.active_column() {
            None => {
                session
                    .delete(&entity)
                    .await
                    .map_err(repository_failed(operation))?;
            }
            Some(active) => {
                let entity = model::set_field(entity, active, Value::Bool(false)).map_err(|err| {
                    tracing::error!(entity = M::NAME, active_field = active, error = %err, "cannot clear active flag");
                    ApiError::internal("An internal error occurred").with_operation(operation)
                })?;
                session
                    .merge(entity)
                    .await
                    .map_err(repository_failed(operation))?;
            }
        }
        self.commit(&mut session, operation).await?;

        tracing::info!(
            entity = M::NAME,
            id = %id,
            soft = self.active_column().is_some(),
            "deleted entity"
        );
        Ok(ItemResponse::deleted())
    }
}
