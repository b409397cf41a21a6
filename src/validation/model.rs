//! Validate-before-save wrapper around a persistable record.
//!
//! ```
//! use lifeguard_related::validation::{Record, ValidatingModel};
//! use lifeguard_related::StatementExecutor;
//! use sea_query::Value;
//!
//! struct User {
//!     id: Option<i64>,
//!     email: String,
//! }
//!
//! impl Record for User {
//!     fn table_name(&self) -> &str {
//!         "users"
//!     }
//!     fn identity(&self) -> Option<Value> {
//!         self.id.map(Value::from)
//!     }
//!     fn set_identity(&mut self, id: Value) {
//!         match id {
//!             Value::BigInt(id) => self.id = id,
//!             Value::Int(id) => self.id = id.map(i64::from),
//!             _ => {}
//!         }
//!     }
//!     fn attributes(&self) -> Vec<(String, Value)> {
//!         vec![("email".into(), self.email.clone().into())]
//!     }
//! }
//!
//! # fn example(db: &dyn StatementExecutor) -> Result<(), lifeguard_related::ValidationError> {
//! let mut user = ValidatingModel::new(User { id: None, email: String::new() }, db);
//! user.set_rule("email", "required|email|unique:users")?;
//! if !user.save()? {
//!     assert_eq!(user.errors().first("email"), Some("The email field is required."));
//! }
//! # Ok(())
//! # }
//! ```

use super::error::ValidationError;
use super::messages::{CustomMessages, MessageBag};
use super::rule::{FieldRules, RuleSet};
use super::validator::{Attributes, RuleValidator, Validator};
use crate::executor::{LifeError, StatementExecutor};
use crate::value_conversion::{value_to_json, value_to_param};
use sea_query::{Alias, Expr, ExprTrait, PostgresQueryBuilder, Query, Value};
use std::fmt;

#[cfg(feature = "tracing")]
use crate::tracing_helpers;

/// A row that knows how to persist itself
pub trait Record {
    fn table_name(&self) -> &str;

    fn primary_key(&self) -> &str {
        "id"
    }

    /// Primary-key value, `None` until the record has been inserted
    fn identity(&self) -> Option<Value>;

    /// Store the key returned by an insert
    fn set_identity(&mut self, id: Value);

    /// Column values to persist; the primary key, if listed, is never written
    fn attributes(&self) -> Vec<(String, Value)>;

    /// Data the validator sees. Defaults to [`attributes`](Self::attributes) as JSON;
    /// override to add non-column fields such as `password_confirmation`.
    fn validation_data(&self) -> Attributes {
        self.attributes()
            .iter()
            .map(|(column, value)| (column.clone(), value_to_json(value)))
            .collect()
    }

    /// Insert or update the row.
    ///
    /// A record without an identity is inserted and receives the key from
    /// `RETURNING`; otherwise its row is updated by key. Returns whether a row was
    /// written.
    ///
    /// # Errors
    ///
    /// Returns `LifeError` if the statement fails or an insert returns no key.
    fn save(&mut self, db: &dyn StatementExecutor) -> Result<bool, LifeError> {
        let table = self.table_name().to_string();
        let pk = self.primary_key().to_string();
        let columns: Vec<(String, Value)> = self.attributes().into_iter().filter(|(c, _)| *c != pk).collect();

        match self.identity().filter(|id| value_to_param(id).is_some()) {
            Some(id) => {
                if columns.is_empty() {
                    return Ok(true);
                }
                let mut update = Query::update();
                update.table(Alias::new(table.as_str()));
                for (column, value) in columns {
                    update.value(Alias::new(column), value);
                }
                update.and_where(Expr::col(Alias::new(pk.as_str())).eq(id));
                let (sql, values) = update.build(PostgresQueryBuilder);
                log::debug!("{sql}");
                Ok(db.execute_statement(&sql, &values)? > 0)
            }
            None => {
                let mut insert = Query::insert();
                insert.into_table(Alias::new(table.as_str()));
                if columns.is_empty() {
                    insert.or_default_values();
                } else {
                    let (names, values): (Vec<_>, Vec<_>) = columns
                        .into_iter()
                        .map(|(column, value)| (Alias::new(column), Expr::val(value)))
                        .unzip();
                    insert.columns(names);
                    insert
                        .values(values)
                        .map_err(|e| LifeError::QueryError(format!("Failed to build insert: {e}")))?;
                }
                insert.returning_col(Alias::new(pk.as_str()));
                let (sql, values) = insert.build(PostgresQueryBuilder);
                log::debug!("{sql}");
                let id = db
                    .fetch_column(&sql, &values)?
                    .into_iter()
                    .next()
                    .ok_or_else(|| LifeError::QueryError(format!("INSERT INTO {table} returned no {pk}")))?;
                self.set_identity(id);
                Ok(true)
            }
        }
    }
}

/// A [`Record`] with field rules checked before every save
///
/// Holds the executor used both for `unique`/`exists` probes and for the save. Errors
/// from the last validation are kept until the next one replaces them.
pub struct ValidatingModel<'db, R: Record> {
    record: R,
    rules: RuleSet,
    custom_messages: CustomMessages,
    errors: MessageBag,
    db: &'db dyn StatementExecutor,
    validator: Box<dyn Validator + 'db>,
}

impl<R: Record + fmt::Debug> fmt::Debug for ValidatingModel<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatingModel")
            .field("record", &self.record)
            .field("rules", &self.rules)
            .field("custom_messages", &self.custom_messages)
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}

impl<'db, R: Record> ValidatingModel<'db, R> {
    /// Wrap `record` with no rules, using the built-in [`RuleValidator`]
    pub fn new(record: R, db: &'db dyn StatementExecutor) -> Self {
        Self::with_validator(record, db, RuleValidator)
    }

    pub fn with_validator(record: R, db: &'db dyn StatementExecutor, validator: impl Validator + 'db) -> Self {
        Self {
            record,
            rules: RuleSet::new(),
            custom_messages: CustomMessages::new(),
            errors: MessageBag::new(),
            db,
            validator: Box::new(validator),
        }
    }

    /// Rules as they will be checked for the current record state
    pub fn normalized_rules(&self) -> RuleSet {
        let identity = self.record.identity().as_ref().and_then(value_to_param);
        self.rules.normalized(identity.as_deref(), self.record.primary_key())
    }

    /// Check the record against its rules and replace the stored errors.
    ///
    /// Returns `Ok(false)` when a rule fails; the messages are in
    /// [`errors`](Self::errors).
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for bad rules or a failed database probe. The
    /// stored errors are left as they were.
    pub fn validate(&mut self) -> Result<bool, ValidationError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::validate_span(self.record.table_name()).entered();

        let rules = self.normalized_rules();
        let data = self.record.validation_data();
        let errors = self.validator.validate(&data, &rules, &self.custom_messages, self.db)?;
        let valid = errors.is_empty();
        if !valid {
            log::debug!(
                "{} failed validation on {} field(s)",
                self.record.table_name(),
                errors.keys().count()
            );
        }
        self.errors = errors;
        Ok(valid)
    }

    /// Alias for [`validate`](Self::validate)
    ///
    /// # Errors
    ///
    /// As [`validate`](Self::validate).
    pub fn is_valid(&mut self) -> Result<bool, ValidationError> {
        self.validate()
    }

    /// Validate, then save only if valid.
    ///
    /// Returns `Ok(false)` without touching the database when validation fails.
    ///
    /// # Errors
    ///
    /// Validation errors, or `ValidationError::Database` if the save fails.
    pub fn save(&mut self) -> Result<bool, ValidationError> {
        if !self.validate()? {
            return Ok(false);
        }
        Ok(self.record.save(self.db)?)
    }

    /// Save without validating.
    ///
    /// # Errors
    ///
    /// Returns `LifeError` if the save fails.
    pub fn force_save(&mut self) -> Result<bool, LifeError> {
        self.record.save(self.db)
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn set_rules(&mut self, rules: RuleSet) -> &mut Self {
        self.rules = rules;
        self
    }

    /// Add or replace the rules of one field.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidRule` if `rules` does not parse; the stored
    /// rules are unchanged.
    pub fn set_rule(&mut self, field: impl Into<String>, rules: &str) -> Result<&mut Self, ValidationError> {
        let rules: FieldRules = rules.parse()?;
        self.rules.set(field, rules);
        Ok(self)
    }

    pub fn set_field_rules(&mut self, field: impl Into<String>, rules: FieldRules) -> &mut Self {
        self.rules.set(field, rules);
        self
    }

    pub fn remove_rule(&mut self, field: &str) -> &mut Self {
        self.rules.remove(field);
        self
    }

    pub fn custom_messages(&self) -> &CustomMessages {
        &self.custom_messages
    }

    pub fn set_custom_messages(&mut self, messages: CustomMessages) -> &mut Self {
        self.custom_messages = messages;
        self
    }

    /// Add or replace the template for `key` (`field.rule` or `rule`)
    pub fn set_custom_message(&mut self, key: impl Into<String>, template: impl Into<String>) -> &mut Self {
        self.custom_messages.set(key, template);
        self
    }

    pub fn remove_custom_message(&mut self, key: &str) -> &mut Self {
        self.custom_messages.remove(key);
        self
    }

    /// Messages from the last validation
    pub fn errors(&self) -> &MessageBag {
        &self.errors
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) -> &mut Self {
        self.errors.add(field, message);
        self
    }

    pub fn record(&self) -> &R {
        &self.record
    }

    pub fn record_mut(&mut self) -> &mut R {
        &mut self.record
    }

    pub fn into_record(self) -> R {
        self.record
    }
}
