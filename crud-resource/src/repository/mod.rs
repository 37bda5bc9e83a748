//! Persistence layer
//!
//! Resources talk to storage through two traits:
//!
//! - [`Engine`]: cloneable handle shared by every request
//! - [`Session`]: one unit of work opened per request
//!
//! A [`Query`] carries the filters, sort keys and window built from the
//! request. Two engines ship with the crate: [`MemoryEngine`] for tests and
//! demos, and `PgEngine` (feature `database`) over a PostgreSQL pool.
//!
//! # Example
//!
//! ```rust,ignore
//! use crud_resource::repository::{Engine, FilterCondition, Query, Session};
//!
//! let mut session = engine.begin().await?;
//! let query = Query::new().filter(FilterCondition::eq("active", true));
//! let active = session.count(&query).await?;
//! ```

mod error;
mod memory;
#[cfg(feature = "database")]
mod postgres;
mod query;
mod traits;

pub use error::{RepositoryError, RepositoryErrorKind, RepositoryOperation};
pub use memory::{MemoryEngine, MemorySession};
#[cfg(feature = "database")]
pub use postgres::{PgEngine, PgSession};
pub use query::{FilterCondition, FilterOperator, FilterValue, OrderDirection, Pagination, Query};
pub use traits::{Engine, RepositoryResult, Session};
