//! Persistence trait definitions
//!
//! Uses RPITIT (Return Position Impl Trait In Traits) for async methods
//! without `async_trait`.
//!
//! - [`Engine`]: shared, cloneable handle that opens sessions
//! - [`Session`]: one unit of work; staged changes become visible to other
//!   sessions only after [`Session::commit`]
//!
//! # Example
//!
//! ```rust,ignore
//! let mut session = engine.begin().await?;
//! let item = session.add(item).await?;
//! if let Err(err) = session.commit().await {
//!     session.rollback().await?;
//!     return Err(err);
//! }
//! ```

use std::future::Future;

use super::error::RepositoryError;
use super::query::Query;
use crate::model::Model;

/// Result type for persistence operations
pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

/// Opens sessions against a store for one model type
pub trait Engine<M: Model>: Clone + Send + Sync + 'static {
    /// Session type produced by this engine
    type Session: Session<M>;

    /// Start a new unit of work
    fn begin(&self) -> impl Future<Output = RepositoryResult<Self::Session>> + Send;
}

/// One unit of work against the store
///
/// A session that is dropped without commit behaves as if rolled back.
pub trait Session<M: Model>: Send {
    /// Load an entity by primary key
    fn get(&mut self, id: i64) -> impl Future<Output = RepositoryResult<Option<M>>> + Send;

    /// Load the entities matching a query, honouring order and window
    fn fetch(&mut self, query: &Query) -> impl Future<Output = RepositoryResult<Vec<M>>> + Send;

    /// Count the entities matching a query's filters
    fn count(&mut self, query: &Query) -> impl Future<Output = RepositoryResult<u64>> + Send;

    /// Stage a new entity; the returned copy carries its primary key
    fn add(&mut self, entity: M) -> impl Future<Output = RepositoryResult<M>> + Send;

    /// Stage the current state of an existing entity
    fn merge(&mut self, entity: M) -> impl Future<Output = RepositoryResult<M>> + Send;

    /// Stage removal of an existing entity
    fn delete(&mut self, entity: &M) -> impl Future<Output = RepositoryResult<()>> + Send;

    /// Make staged changes durable
    fn commit(&mut self) -> impl Future<Output = RepositoryResult<()>> + Send;

    /// Discard staged changes
    fn rollback(&mut self) -> impl Future<Output = RepositoryResult<()>> + Send;
}
