//! Crate-level errors
//!
//! [`Error`] covers failures outside a single resource request: loading
//! configuration, connecting to the database, installing the log
//! subscriber, binding the server socket. Request-level failures use
//! [`crate::handlers::ApiError`].

use thiserror::Error;

use crate::repository::RepositoryError;

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Startup and serving errors
///
/// The figment error is boxed to keep `Result` small.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be loaded or did not fit [`crate::config::Config`]
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// Configuration parsed but holds values that cannot be served
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Persistence setup failed
    #[error("{0}")]
    Repository(#[from] RepositoryError),

    /// I/O error, e.g. binding the listener
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_converts() {
        let err: Error = RepositoryError::connection_failed("refused").into();
        assert!(matches!(err, Error::Repository(_)));
        assert!(err.to_string().contains("connection_failed"));
    }

    #[test]
    fn test_figment_error_is_boxed() {
        let err: Error = figment::Error::from("bad value".to_string()).into();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().starts_with("Configuration error:"));
    }
}
