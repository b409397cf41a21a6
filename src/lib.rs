//! # Lifeguard Related
//!
//! Relationship filters and validate-before-save models for the Lifeguard PostgreSQL
//! data layer.
//!
//! - [`FilterQuery::where_related`] and friends filter a model by a condition on a
//!   related model (`"posts.comments"`), folding one lookup query into a primary-key
//!   membership predicate.
//! - [`ValidatingModel`] checks declared field rules before every save.
//!
//! Relations are declared explicitly in a [`Schema`]; every query and model receives
//! its executor at construction.
//!
//! ```no_run
//! use lifeguard_related::schema::{ModelDef, RelationDef, Schema};
//! use lifeguard_related::{connection, DatabaseConfig, Operator};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let schema = Schema::builder()
//!     .model(ModelDef::new("User", "users").relation("posts", RelationDef::has_many("Post", "user_id")))
//!     .model(ModelDef::new("Post", "posts"))
//!     .build();
//!
//! let db = connection::connect_with_config(&DatabaseConfig::load()?)?;
//! let authors = schema
//!     .query("User", &db)?
//!     .where_related("posts", "published", Operator::Eq, true)?
//!     .keys()?;
//! # Ok(())
//! # }
//! ```
//!
//! See [README on GitHub](https://github.com/microscaler/lifeguard) for the wider
//! Lifeguard architecture.

pub mod config;
pub mod connection;
pub mod executor;
pub mod query;
pub mod schema;
pub mod validation;
pub mod value_conversion;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(feature = "tracing")]
pub mod tracing_helpers;

pub use config::DatabaseConfig;
pub use connection::ConnectionError;
pub use executor::{LifeError, LifeExecutor, MayPostgresExecutor, StatementExecutor};
pub use query::{Boolean, FilterQuery, FromRow, Operator, Predicate, RelationError, WhereClause};
pub use schema::{ModelDef, RelatedEntity, RelationDef, RelationKind, Schema};
pub use validation::{
    CustomMessages, MessageBag, Record, RuleSet, RuleValidator, ValidatingModel, ValidationError, Validator,
};
