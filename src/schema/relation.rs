//! Relation kinds and definitions.
//!
//! A relation is declared once on its parent [`ModelDef`](super::ModelDef) and looked
//! up by name at translation time.

use std::fmt;

/// How two tables are connected
///
/// Foreign keys are plain column names; the join resolver qualifies them with the
/// table that owns them (the related table for has-one/has-many, the pivot table for
/// many-to-many, the parent table for belongs-to).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RelationKind {
    /// Many-to-one: the parent holds `foreign_key` pointing at the related primary key
    BelongsTo { foreign_key: String },
    /// One-to-one: the related table holds `foreign_key` pointing at the parent
    HasOne { foreign_key: String },
    /// One-to-many: the related table holds `foreign_key` pointing at the parent
    HasMany { foreign_key: String },
    /// Polymorphic one-to-one (`morph_type` names the discriminator column)
    MorphOne { foreign_key: String, morph_type: String },
    /// Polymorphic one-to-many
    MorphMany { foreign_key: String, morph_type: String },
    /// Many-to-many through `pivot_table`
    BelongsToMany {
        pivot_table: String,
        /// Pivot column referencing the parent
        foreign_key: String,
        /// Pivot column referencing the related model
        other_key: String,
    },
    /// Distant one-to-many through an intermediate model
    ///
    /// Declarable, but has no join translation.
    HasManyThrough {
        through: String,
        first_key: String,
        second_key: String,
    },
    /// Inverse side of a polymorphic relation
    ///
    /// The related table is only known per row, so it has no join translation.
    MorphTo { morph_type: String, foreign_key: String },
}

impl RelationKind {
    /// Short name used in logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            RelationKind::BelongsTo { .. } => "BelongsTo",
            RelationKind::HasOne { .. } => "HasOne",
            RelationKind::HasMany { .. } => "HasMany",
            RelationKind::MorphOne { .. } => "MorphOne",
            RelationKind::MorphMany { .. } => "MorphMany",
            RelationKind::BelongsToMany { .. } => "BelongsToMany",
            RelationKind::HasManyThrough { .. } => "HasManyThrough",
            RelationKind::MorphTo { .. } => "MorphTo",
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A named relation on a model: its kind plus the name of the related model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDef {
    pub kind: RelationKind,
    /// Name of the related model in the [`Schema`](super::Schema)
    pub related: String,
}

impl RelationDef {
    pub fn new(kind: RelationKind, related: impl Into<String>) -> Self {
        Self {
            kind,
            related: related.into(),
        }
    }

    pub fn belongs_to(related: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self::new(
            RelationKind::BelongsTo {
                foreign_key: foreign_key.into(),
            },
            related,
        )
    }

    pub fn has_one(related: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self::new(
            RelationKind::HasOne {
                foreign_key: foreign_key.into(),
            },
            related,
        )
    }

    pub fn has_many(related: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self::new(
            RelationKind::HasMany {
                foreign_key: foreign_key.into(),
            },
            related,
        )
    }

    /// `morph_name` is the polymorphic prefix: `commentable` gives
    /// `commentable_id` / `commentable_type`.
    pub fn morph_many(related: impl Into<String>, morph_name: &str) -> Self {
        Self::new(
            RelationKind::MorphMany {
                foreign_key: format!("{morph_name}_id"),
                morph_type: format!("{morph_name}_type"),
            },
            related,
        )
    }

    pub fn morph_one(related: impl Into<String>, morph_name: &str) -> Self {
        Self::new(
            RelationKind::MorphOne {
                foreign_key: format!("{morph_name}_id"),
                morph_type: format!("{morph_name}_type"),
            },
            related,
        )
    }

    pub fn belongs_to_many(
        related: impl Into<String>,
        pivot_table: impl Into<String>,
        foreign_key: impl Into<String>,
        other_key: impl Into<String>,
    ) -> Self {
        Self::new(
            RelationKind::BelongsToMany {
                pivot_table: pivot_table.into(),
                foreign_key: foreign_key.into(),
                other_key: other_key.into(),
            },
            related,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_morph_helpers_derive_column_names() {
        let rel = RelationDef::morph_many("Comment", "commentable");
        assert_eq!(
            rel.kind,
            RelationKind::MorphMany {
                foreign_key: "commentable_id".into(),
                morph_type: "commentable_type".into(),
            }
        );
        assert_eq!(rel.related, "Comment");
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(RelationDef::belongs_to("User", "user_id").kind.to_string(), "BelongsTo");
        assert_eq!(
            RelationKind::MorphTo {
                morph_type: "t".into(),
                foreign_key: "id".into()
            }
            .to_string(),
            "MorphTo"
        );
    }
}
