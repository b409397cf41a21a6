//! Query building for relationship filters.
//!
//! - [`filter`]: `FilterQuery`, the query under construction, with plain column filters
//! - [`related`]: the `where_related` family and join resolution
//! - [`clause`]: where-clause list, operators and compilation to sea-query
//! - [`error`]: `RelationError`

pub mod clause;
pub mod error;
pub mod filter;
pub mod related;

pub use clause::{Boolean, Operator, Predicate, WhereClause};
pub use error::RelationError;
pub use filter::{FilterQuery, FromRow};
pub use related::{join_clauses, JoinClause, KeySet, RelationPath};
