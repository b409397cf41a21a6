//! Error type for validation.

use crate::executor::LifeError;
use std::fmt;

/// Errors raised while validating or saving a record
///
/// A record that fails its rules is not an error; see
/// [`ValidatingModel::validate`](super::ValidatingModel::validate).
#[derive(Debug)]
pub enum ValidationError {
    /// A rule string could not be parsed
    InvalidRule(String),
    /// The rule name is not supported by the validator
    UnknownRule(String),
    /// The rule's parameters are missing or malformed
    InvalidParameters { rule: String, reason: String },
    /// A database probe (`unique`, `exists`) or the save itself failed
    Database(LifeError),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::InvalidRule(rule) => write!(f, "Invalid validation rule: {rule:?}"),
            ValidationError::UnknownRule(rule) => write!(f, "Unknown validation rule: {rule}"),
            ValidationError::InvalidParameters { rule, reason } => {
                write!(f, "Invalid parameters for rule {rule}: {reason}")
            }
            ValidationError::Database(e) => write!(f, "Database error: {e}"),
        }
    }
}

impl std::error::Error for ValidationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ValidationError::Database(e) => Some(e),
            _ => None,
        }
    }
}

impl From<LifeError> for ValidationError {
    fn from(err: LifeError) -> Self {
        ValidationError::Database(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = ValidationError::InvalidParameters {
            rule: "min".into(),
            reason: "expected a number".into(),
        };
        assert_eq!(err.to_string(), "Invalid parameters for rule min: expected a number");
        let db: ValidationError = LifeError::Other("gone".into()).into();
        assert!(std::error::Error::source(&db).is_some());
    }
}
