//! Validate-before-save models.
//!
//! [`ValidatingModel`] wraps a [`Record`] with a [`RuleSet`] and custom messages. Every
//! [`save`](ValidatingModel::save) runs the [`Validator`] first and skips the database
//! when a rule fails; [`force_save`](ValidatingModel::force_save) skips validation.

pub mod error;
pub mod messages;
pub mod model;
pub mod rule;
pub mod validator;

pub use error::ValidationError;
pub use messages::{CustomMessages, MessageBag};
pub use model::{Record, ValidatingModel};
pub use rule::{FieldRules, Rule, RuleSet};
pub use validator::{Attributes, RuleValidator, Validator};
