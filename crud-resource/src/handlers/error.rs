//! API error types for resource handlers
//!
//! Structured errors for the five collection verbs, with HTTP status
//! mapping via `IntoResponse`. Persistence, validation and model errors all
//! convert into [`ApiError`].
//!
//! # Example
//!
//! ```rust
//! use crud_resource::handlers::{ApiError, ApiErrorKind, ApiOperation};
//!
//! let error = ApiError::not_found("Item", "42").with_operation(ApiOperation::Put);
//! assert!(matches!(error.kind, ApiErrorKind::NotFound));
//! assert_eq!(error.entity_id, Some("42".to_string()));
//! ```

use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::model::ModelError;
use crate::repository::{RepositoryError, RepositoryErrorKind, RepositoryOperation};
use crate::validation::{FieldError, ValidationError};

/// Verb being served when the API error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiOperation {
    /// Listing the collection
    Index,
    /// Reading one entity
    Get,
    /// Creating an entity
    Post,
    /// Updating an entity
    Put,
    /// Deleting (or deactivating) an entity
    Delete,
}

impl fmt::Display for ApiOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index => write!(f, "index"),
            Self::Get => write!(f, "get"),
            Self::Post => write!(f, "post"),
            Self::Put => write!(f, "put"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// Category of API error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiErrorKind {
    /// Entity was not found
    NotFound,
    /// Parameters or body failed validation
    ValidationFailed,
    /// Malformed request
    BadRequest,
    /// Operation conflicts with stored state
    Conflict,
    /// Internal server error
    InternalError,
    /// Storage temporarily unavailable
    ServiceUnavailable,
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::ValidationFailed => write!(f, "validation_failed"),
            Self::BadRequest => write!(f, "bad_request"),
            Self::Conflict => write!(f, "conflict"),
            Self::InternalError => write!(f, "internal_error"),
            Self::ServiceUnavailable => write!(f, "service_unavailable"),
        }
    }
}

impl ApiErrorKind {
    /// Get the HTTP status code for this error kind
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::ValidationFailed | Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::Conflict => StatusCode::CONFLICT,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Get the error code string for this error kind
    #[must_use]
    pub fn error_code(&self) -> String {
        format!("{}", self).to_uppercase()
    }
}

/// Structured API error with operation context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// The verb being served when the error occurred
    pub operation: ApiOperation,
    /// The category of error
    pub kind: ApiErrorKind,
    /// Human-readable error message
    pub message: String,
    /// The type of entity involved (e.g., "Item")
    pub entity_type: Option<String>,
    /// The ID of the entity involved
    pub entity_id: Option<String>,
    /// Per-field failures for validation errors
    pub field_errors: Vec<FieldError>,
}

impl ApiError {
    /// Create a new API error
    pub fn new(operation: ApiOperation, kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
            entity_type: None,
            entity_id: None,
            field_errors: Vec::new(),
        }
    }

    /// Create a "not found" error with entity context
    ///
    /// ```rust
    /// use crud_resource::handlers::ApiError;
    ///
    /// let error = ApiError::not_found("Item", "7");
    /// assert_eq!(error.entity_type, Some("Item".to_string()));
    /// ```
    pub fn not_found(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self::new(ApiOperation::Get, ApiErrorKind::NotFound, "Entity not found")
            .with_entity(entity_type, entity_id)
    }

    /// Create a validation error carrying field errors
    pub fn validation_failed(operation: ApiOperation, errors: Vec<FieldError>) -> Self {
        Self {
            field_errors: errors,
            ..Self::new(operation, ApiErrorKind::ValidationFailed, "Validation failed")
        }
    }

    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ApiOperation::Index, ApiErrorKind::BadRequest, message)
    }

    /// Create a conflict error
    pub fn conflict(operation: ApiOperation, message: impl Into<String>) -> Self {
        Self::new(operation, ApiErrorKind::Conflict, message)
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ApiOperation::Get, ApiErrorKind::InternalError, message)
    }

    /// Create a service unavailable error
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ApiOperation::Get, ApiErrorKind::ServiceUnavailable, message)
    }

    /// Add entity context to an existing error
    #[must_use]
    pub fn with_entity(
        mut self,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }

    /// Set the verb that caused the error
    #[must_use]
    pub fn with_operation(mut self, operation: ApiOperation) -> Self {
        self.operation = operation;
        self
    }

    /// Check if this error is retriable (transient errors that may succeed on retry)
    ///
    /// ```rust
    /// use crud_resource::handlers::ApiError;
    ///
    /// assert!(ApiError::service_unavailable("Connection reset").is_retriable());
    /// assert!(!ApiError::not_found("Item", "123").is_retriable());
    /// ```
    pub fn is_retriable(&self) -> bool {
        matches!(self.kind, ApiErrorKind::ServiceUnavailable)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "API {} error during {}: {}",
            self.kind, self.operation, self.message
        )?;
        if let (Some(ref entity_type), Some(ref entity_id)) = (&self.entity_type, &self.entity_id) {
            write!(f, " [{}: {}]", entity_type, entity_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {}

/// Response body for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// Human-readable message
    pub error: String,
    /// Machine-readable code, e.g. `NOT_FOUND`
    pub code: String,
    /// HTTP status
    pub status: u16,
    /// Verb being served
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    /// Entity type involved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    /// Entity id involved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    /// Per-field validation failures
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.kind.status_code();
        let code = self.kind.error_code();

        if status.is_server_error() {
            tracing::error!(
                operation = %self.operation,
                kind = %self.kind,
                entity_type = ?self.entity_type,
                entity_id = ?self.entity_id,
                retriable = self.is_retriable(),
                "API error: {}", self.message
            );
        } else {
            tracing::debug!(
                operation = %self.operation,
                kind = %self.kind,
                entity_type = ?self.entity_type,
                entity_id = ?self.entity_id,
                field_errors = self.field_errors.len(),
                "API error: {}", self.message
            );
        }

        let response = ApiErrorResponse {
            error: self.message,
            code,
            status: status.as_u16(),
            operation: Some(self.operation.to_string()),
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            errors: self.field_errors,
        };

        (status, Json(response)).into_response()
    }
}

/// Best-effort verb for a persistence operation
///
/// Session lifecycle operations have no verb of their own; handlers
/// override the operation with the verb they serve.
fn repository_operation_to_api_operation(op: RepositoryOperation) -> ApiOperation {
    match op {
        RepositoryOperation::Begin | RepositoryOperation::Get => ApiOperation::Get,
        RepositoryOperation::Fetch | RepositoryOperation::Count => ApiOperation::Index,
        RepositoryOperation::Add
        | RepositoryOperation::Commit
        | RepositoryOperation::Rollback => ApiOperation::Post,
        RepositoryOperation::Merge => ApiOperation::Put,
        RepositoryOperation::Delete => ApiOperation::Delete,
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        let operation = repository_operation_to_api_operation(err.operation);

        let kind = match err.kind {
            RepositoryErrorKind::NotFound => ApiErrorKind::NotFound,
            RepositoryErrorKind::ConstraintViolation => ApiErrorKind::Conflict,
            RepositoryErrorKind::ConnectionFailed | RepositoryErrorKind::Timeout => {
                ApiErrorKind::ServiceUnavailable
            }
            RepositoryErrorKind::InvalidState
            | RepositoryErrorKind::DatabaseError
            | RepositoryErrorKind::SerializationError
            | RepositoryErrorKind::Other => ApiErrorKind::InternalError,
        };

        // Internal details stay in the logs
        let message = match kind {
            ApiErrorKind::ServiceUnavailable => "Service temporarily unavailable".to_string(),
            ApiErrorKind::InternalError => "An internal error occurred".to_string(),
            _ => err.message,
        };

        Self {
            operation,
            kind,
            message,
            entity_type: err.entity_type,
            entity_id: err.entity_id,
            field_errors: Vec::new(),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::validation_failed(ApiOperation::Index, err.errors)
    }
}

impl From<ModelError> for ApiError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::InvalidField { field, source } => Self::validation_failed(
                ApiOperation::Post,
                vec![FieldError::new(field, "INVALID_TYPE", source.to_string())],
            ),
            other => {
                tracing::error!(error = %other, "entity mapping failed");
                Self::internal("An internal error occurred")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::json;

    #[test]
    fn test_api_operation_display() {
        assert_eq!(format!("{}", ApiOperation::Index), "index");
        assert_eq!(format!("{}", ApiOperation::Get), "get");
        assert_eq!(format!("{}", ApiOperation::Post), "post");
        assert_eq!(format!("{}", ApiOperation::Put), "put");
        assert_eq!(format!("{}", ApiOperation::Delete), "delete");
    }

    #[test]
    fn test_api_error_kind_status_codes() {
        assert_eq!(ApiErrorKind::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ApiErrorKind::ValidationFailed.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiErrorKind::BadRequest.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiErrorKind::Conflict.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ApiErrorKind::InternalError.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiErrorKind::ServiceUnavailable.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_api_error_kind_error_codes() {
        assert_eq!(ApiErrorKind::NotFound.error_code(), "NOT_FOUND");
        assert_eq!(ApiErrorKind::ValidationFailed.error_code(), "VALIDATION_FAILED");
        assert_eq!(ApiErrorKind::InternalError.error_code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_display_with_entity() {
        let error = ApiError::not_found("Item", "9").with_operation(ApiOperation::Delete);
        assert_eq!(
            error.to_string(),
            "API not_found error during delete: Entity not found [Item: 9]"
        );
    }

    #[test]
    fn test_from_repository_error_not_found() {
        let api_err: ApiError = RepositoryError::not_found("Item", "5").into();
        assert_eq!(api_err.operation, ApiOperation::Get);
        assert_eq!(api_err.kind, ApiErrorKind::NotFound);
        assert_eq!(api_err.entity_id, Some("5".to_string()));
    }

    #[test]
    fn test_from_repository_error_constraint_violation() {
        let api_err: ApiError =
            RepositoryError::constraint_violation(RepositoryOperation::Merge, "duplicate key")
                .into();
        assert_eq!(api_err.operation, ApiOperation::Put);
        assert_eq!(api_err.kind, ApiErrorKind::Conflict);
        assert_eq!(api_err.message, "duplicate key");
    }

    #[test]
    fn test_from_repository_error_hides_internals() {
        let api_err: ApiError =
            RepositoryError::database_error(RepositoryOperation::Commit, "disk full").into();
        assert_eq!(api_err.kind, ApiErrorKind::InternalError);
        assert_eq!(api_err.message, "An internal error occurred");

        let api_err: ApiError = RepositoryError::connection_failed("refused").into();
        assert_eq!(api_err.kind, ApiErrorKind::ServiceUnavailable);
        assert_eq!(api_err.message, "Service temporarily unavailable");
        assert!(api_err.is_retriable());
    }

    #[test]
    fn test_from_validation_error() {
        let err = ValidationError::single("name", "REQUIRED", "field is required");
        let api_err = ApiError::from(err).with_operation(ApiOperation::Post);
        assert_eq!(api_err.kind, ApiErrorKind::ValidationFailed);
        assert_eq!(api_err.field_errors.len(), 1);
        assert_eq!(api_err.field_errors[0].field, "name");
    }

    #[test]
    fn test_from_model_error_invalid_field() {
        let source = serde_json::from_value::<i64>(json!("x")).unwrap_err();
        let api_err = ApiError::from(ModelError::InvalidField {
            field: "quantity".to_string(),
            source,
        });
        assert_eq!(api_err.kind, ApiErrorKind::ValidationFailed);
        assert_eq!(api_err.field_errors[0].code, "INVALID_TYPE");
    }

    #[tokio::test]
    async fn test_response_body() {
        let err = ApiError::validation_failed(
            ApiOperation::Post,
            vec![FieldError::new("name", "REQUIRED", "field is required")],
        );
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["code"], "VALIDATION_FAILED");
        assert_eq!(body["status"], 400);
        assert_eq!(body["operation"], "post");
        assert_eq!(body["errors"][0]["field"], "name");
        assert!(body.get("entity_id").is_none());
    }
}
