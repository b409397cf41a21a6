//! Error type for relation filters.

use crate::executor::LifeError;
use std::fmt;

/// Errors raised while translating a relationship filter
///
/// Everything except `Database` is detected before the lookup query runs.
#[derive(Debug)]
pub enum RelationError {
    /// The relationship path is empty or contains an empty segment
    InvalidRelationPath(String),
    /// No model is registered under this name
    UnknownModel(String),
    /// The model declares no relation with this name
    UnknownRelation { model: String, relation: String },
    /// The relation kind has no join translation
    UnsupportedRelationKind {
        model: String,
        relation: String,
        kind: &'static str,
    },
    /// The comparison operator is not recognised
    InvalidOperator(String),
    /// The lookup query failed
    Database(LifeError),
}

impl fmt::Display for RelationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationError::InvalidRelationPath(path) => {
                write!(f, "Invalid relation path: {path:?}")
            }
            RelationError::UnknownModel(model) => write!(f, "Unknown model: {model}"),
            RelationError::UnknownRelation { model, relation } => {
                write!(f, "Model {model} has no relation named {relation}")
            }
            RelationError::UnsupportedRelationKind {
                model,
                relation,
                kind,
            } => write!(
                f,
                "Relation {model}.{relation} is a {kind} relation, which cannot be used in where_related"
            ),
            RelationError::InvalidOperator(op) => write!(f, "Invalid comparison operator: {op}"),
            RelationError::Database(e) => write!(f, "Lookup query failed: {e}"),
        }
    }
}

impl std::error::Error for RelationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RelationError::Database(e) => Some(e),
            _ => None,
        }
    }
}

impl From<LifeError> for RelationError {
    fn from(err: LifeError) -> Self {
        RelationError::Database(err)
    }
}
