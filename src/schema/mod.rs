//! Model and relationship metadata.
//!
//! A [`Schema`] maps model names to [`ModelDef`]s. Each `ModelDef` carries the table
//! name, the primary-key column, and its named relations. Relation paths such as
//! `"posts.comments"` are resolved hop by hop against this registry, so no method
//! dispatch or reflection is involved.
//!
//! # Example
//!
//! ```
//! use lifeguard_related::schema::{ModelDef, RelationDef, Schema};
//!
//! let schema = Schema::builder()
//!     .model(
//!         ModelDef::new("User", "users")
//!             .relation("posts", RelationDef::has_many("Post", "user_id")),
//!     )
//!     .model(
//!         ModelDef::new("Post", "posts")
//!             .relation("author", RelationDef::belongs_to("User", "user_id")),
//!     )
//!     .build();
//!
//! assert_eq!(schema.model("Post").unwrap().table(), "posts");
//! ```

pub mod relation;

#[doc(inline)]
pub use relation::{RelationDef, RelationKind};

use crate::query::RelationError;
use std::collections::BTreeMap;

/// Table-level metadata for one model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDef {
    name: String,
    table: String,
    primary_key: String,
    deleted_at: Option<String>,
    relations: BTreeMap<String, RelationDef>,
}

impl ModelDef {
    /// New model with primary key `id`
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            primary_key: "id".to_string(),
            deleted_at: None,
            relations: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = column.into();
        self
    }

    /// Rows with a non-null `column` count as deleted and are left out of queries
    #[must_use]
    pub fn soft_deletes(mut self, column: impl Into<String>) -> Self {
        self.deleted_at = Some(column.into());
        self
    }

    /// Declare a relation; redeclaring a name replaces the earlier definition.
    #[must_use]
    pub fn relation(mut self, name: impl Into<String>, def: RelationDef) -> Self {
        self.relations.insert(name.into(), def);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn key_name(&self) -> &str {
        &self.primary_key
    }

    pub fn deleted_at_column(&self) -> Option<&str> {
        self.deleted_at.as_deref()
    }

    pub fn relations(&self) -> impl Iterator<Item = (&str, &RelationDef)> {
        self.relations.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Look up a relation by name.
    ///
    /// # Errors
    ///
    /// Returns `RelationError::UnknownRelation` if the model declares no such relation.
    pub fn get_relation(&self, name: &str) -> Result<&RelationDef, RelationError> {
        self.relations
            .get(name)
            .ok_or_else(|| RelationError::UnknownRelation {
                model: self.name.clone(),
                relation: name.to_string(),
            })
    }
}

/// Types that describe their own [`ModelDef`]
///
/// Lets a schema be assembled from entity types instead of string literals:
///
/// ```
/// use lifeguard_related::schema::{ModelDef, RelatedEntity, RelationDef, Schema};
///
/// struct Team;
///
/// impl RelatedEntity for Team {
///     const MODEL: &'static str = "Team";
///
///     fn model_def() -> ModelDef {
///         ModelDef::new(Self::MODEL, "teams")
///             .relation("members", RelationDef::has_many("User", "team_id"))
///     }
/// }
///
/// let schema = Schema::builder().entity::<Team>().build();
/// assert!(schema.model(Team::MODEL).is_ok());
/// ```
pub trait RelatedEntity {
    /// Name under which the model is registered
    const MODEL: &'static str;

    fn model_def() -> ModelDef;
}

/// Immutable registry of model definitions
#[derive(Debug, Clone, Default)]
pub struct Schema {
    models: BTreeMap<String, ModelDef>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Look up a model by name.
    ///
    /// # Errors
    ///
    /// Returns `RelationError::UnknownModel` if no model is registered under `name`.
    pub fn model(&self, name: &str) -> Result<&ModelDef, RelationError> {
        self.models
            .get(name)
            .ok_or_else(|| RelationError::UnknownModel(name.to_string()))
    }

    /// Follow one relation from `model`, returning the relation and the related model.
    ///
    /// # Errors
    ///
    /// `UnknownRelation` when `model` has no relation `name`, `UnknownModel` when the
    /// relation points at an unregistered model.
    pub fn resolve<'s>(
        &'s self,
        model: &'s ModelDef,
        name: &str,
    ) -> Result<(&'s RelationDef, &'s ModelDef), RelationError> {
        let relation = model.get_relation(name)?;
        let related = self.model(&relation.related)?;
        Ok((relation, related))
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// Builder for [`Schema`]
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    models: BTreeMap<String, ModelDef>,
}

impl SchemaBuilder {
    #[must_use]
    pub fn model(mut self, def: ModelDef) -> Self {
        self.models.insert(def.name.clone(), def);
        self
    }

    #[must_use]
    pub fn entity<E: RelatedEntity>(self) -> Self {
        self.model(E::model_def())
    }

    pub fn build(self) -> Schema {
        for model in self.models.values() {
            for (name, rel) in model.relations() {
                if !self.models.contains_key(&rel.related) {
                    log::warn!(
                        "relation {}.{name} points at unregistered model {}",
                        model.name(),
                        rel.related
                    );
                }
            }
        }
        Schema { models: self.models }
    }
}
