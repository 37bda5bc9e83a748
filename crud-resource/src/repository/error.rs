//! Repository error types
//!
//! Structured errors for session operations, carrying the operation that
//! failed, a category, and the entity involved when one is known.
//!
//! # Example
//!
//! ```rust
//! use crud_resource::repository::{RepositoryError, RepositoryErrorKind};
//!
//! let error = RepositoryError::not_found("Item", "42");
//! assert!(matches!(error.kind, RepositoryErrorKind::NotFound));
//! assert!(error.entity_id.is_some());
//! ```

use std::fmt;

/// Session operation being performed when the error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryOperation {
    /// Opening a session (acquiring a connection, starting a transaction)
    Begin,
    /// Loading a single entity by primary key
    Get,
    /// Loading the entities matching a query
    Fetch,
    /// Counting the entities matching a query
    Count,
    /// Staging a new entity
    Add,
    /// Staging changes to an existing entity
    Merge,
    /// Staging removal of an entity
    Delete,
    /// Committing the session
    Commit,
    /// Rolling the session back
    Rollback,
}

impl fmt::Display for RepositoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Begin => write!(f, "begin"),
            Self::Get => write!(f, "get"),
            Self::Fetch => write!(f, "fetch"),
            Self::Count => write!(f, "count"),
            Self::Add => write!(f, "add"),
            Self::Merge => write!(f, "merge"),
            Self::Delete => write!(f, "delete"),
            Self::Commit => write!(f, "commit"),
            Self::Rollback => write!(f, "rollback"),
        }
    }
}

/// Category of repository error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryErrorKind {
    /// Entity was not found
    NotFound,
    /// Database constraint violation (unique, foreign key, check)
    ConstraintViolation,
    /// Failed to connect to the database
    ConnectionFailed,
    /// Operation timed out
    Timeout,
    /// Session was already finished or in an unusable state
    InvalidState,
    /// Underlying database error
    DatabaseError,
    /// Entity could not be converted to or from its stored form
    SerializationError,
    /// Other unclassified error
    Other,
}

impl fmt::Display for RepositoryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::ConstraintViolation => write!(f, "constraint_violation"),
            Self::ConnectionFailed => write!(f, "connection_failed"),
            Self::Timeout => write!(f, "timeout"),
            Self::InvalidState => write!(f, "invalid_state"),
            Self::DatabaseError => write!(f, "database_error"),
            Self::SerializationError => write!(f, "serialization_error"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Structured repository error with operation context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryError {
    /// The operation being performed when the error occurred
    pub operation: RepositoryOperation,
    /// The category of error
    pub kind: RepositoryErrorKind,
    /// Human-readable error message
    pub message: String,
    /// The type of entity involved (e.g., "Item")
    pub entity_type: Option<String>,
    /// The ID of the entity involved
    pub entity_id: Option<String>,
}

impl RepositoryError {
    /// Create a new repository error
    pub fn new(
        operation: RepositoryOperation,
        kind: RepositoryErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
            entity_type: None,
            entity_id: None,
        }
    }

    /// Create a "not found" error with entity context
    pub fn not_found(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self::new(
            RepositoryOperation::Get,
            RepositoryErrorKind::NotFound,
            "Entity not found",
        )
        .with_entity(entity_type, entity_id)
    }

    /// Create a constraint violation error
    pub fn constraint_violation(
        operation: RepositoryOperation,
        message: impl Into<String>,
    ) -> Self {
        Self::new(operation, RepositoryErrorKind::ConstraintViolation, message)
    }

    /// Create a connection failed error
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::new(
            RepositoryOperation::Begin,
            RepositoryErrorKind::ConnectionFailed,
            message,
        )
    }

    /// Create a timeout error
    pub fn timeout(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::Timeout, message)
    }

    /// Create an error for a session used after commit or rollback
    pub fn invalid_state(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::InvalidState, message)
    }

    /// Create a generic database error
    pub fn database_error(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::DatabaseError, message)
    }

    /// Create a serialization error
    pub fn serialization_error(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::SerializationError, message)
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

    /// Set the operation that caused the error
    #[must_use]
    pub fn with_operation(mut self, operation: RepositoryOperation) -> Self {
        self.operation = operation;
        self
    }

    /// Check if this error is transient
    pub fn is_retriable(&self) -> bool {
        matches!(
            self.kind,
            RepositoryErrorKind::ConnectionFailed | RepositoryErrorKind::Timeout
        )
    }
}

impl fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Repository {} error during {}: {}",
            self.kind, self.operation, self.message
        )?;
        if let (Some(ref entity_type), Some(ref entity_id)) = (&self.entity_type, &self.entity_id) {
            write!(f, " [{}: {}]", entity_type, entity_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for RepositoryError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_operation_display() {
        assert_eq!(format!("{}", RepositoryOperation::Begin), "begin");
        assert_eq!(format!("{}", RepositoryOperation::Get), "get");
        assert_eq!(format!("{}", RepositoryOperation::Fetch), "fetch");
        assert_eq!(format!("{}", RepositoryOperation::Count), "count");
        assert_eq!(format!("{}", RepositoryOperation::Add), "add");
        assert_eq!(format!("{}", RepositoryOperation::Merge), "merge");
        assert_eq!(format!("{}", RepositoryOperation::Delete), "delete");
        assert_eq!(format!("{}", RepositoryOperation::Commit), "commit");
        assert_eq!(format!("{}", RepositoryOperation::Rollback), "rollback");
    }

    #[test]
    fn test_not_found_carries_entity() {
        let error = RepositoryError::not_found("Item", "7");
        assert_eq!(error.operation, RepositoryOperation::Get);
        assert_eq!(error.kind, RepositoryErrorKind::NotFound);
        assert_eq!(error.entity_type.as_deref(), Some("Item"));
        assert_eq!(error.entity_id.as_deref(), Some("7"));
    }

    #[test]
    fn test_display_formatting() {
        let error = RepositoryError::database_error(RepositoryOperation::Commit, "disk full");
        assert_eq!(
            error.to_string(),
            "Repository database_error error during commit: disk full"
        );

        let error = RepositoryError::not_found("Item", "3");
        assert_eq!(
            error.to_string(),
            "Repository not_found error during get: Entity not found [Item: 3]"
        );
    }

    #[test]
    fn test_is_retriable() {
        assert!(RepositoryError::connection_failed("refused").is_retriable());
        assert!(RepositoryError::timeout(RepositoryOperation::Fetch, "slow").is_retriable());
        assert!(!RepositoryError::constraint_violation(RepositoryOperation::Add, "dup")
            .is_retriable());
        assert!(!RepositoryError::not_found("Item", "1").is_retriable());
    }

    #[test]
    fn test_with_operation() {
        let error = RepositoryError::connection_failed("refused")
            .with_operation(RepositoryOperation::Commit);
        assert_eq!(error.operation, RepositoryOperation::Commit);
        assert_eq!(error.kind, RepositoryErrorKind::ConnectionFailed);
    }
}
