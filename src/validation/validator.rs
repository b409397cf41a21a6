//! The validator seam and the built-in rule engine.
//!
//! [`Validator`] is what a [`ValidatingModel`](super::ValidatingModel) calls; swap it
//! to plug in another engine. [`RuleValidator`] implements the familiar rule names:
//!
//! | Rule | Passes when |
//! |---|---|
//! | `required` | present, not null, not a blank string or empty array |
//! | `nullable` | always (marks the field optional) |
//! | `string`, `integer`, `numeric`, `boolean` | the value has that type |
//! | `email` | looks like `local@domain.tld` |
//! | `alpha`, `alpha_num`, `alpha_dash` | letters / letters and digits / plus `-` and `_` |
//! | `min:n`, `max:n`, `between:a,b` | size within bounds |
//! | `in:a,b,..`, `not_in:a,b,..` | value (as text) is / is not listed |
//! | `regex:/pattern/` | the pattern matches |
//! | `same:other`, `confirmed` | equals `other` / `<field>_confirmation` |
//! | `unique:table[,column[,except[,id_column]]]` | no other row has the value |
//! | `exists:table[,column]` | some row has the value |
//!
//! Every rule except `required` is skipped when the value is absent, null or a blank
//! string. Sizes are numeric values for fields that also carry `integer` or `numeric`,
//! character counts for strings and lengths for arrays.

use super::error::ValidationError;
use super::messages::{CustomMessages, MessageBag};
use super::rule::{FieldRules, Rule, RuleSet};
use crate::executor::StatementExecutor;
use crate::query::clause::{column_expr, qualify};
use crate::value_conversion::json_to_text;
use once_cell::sync::Lazy;
use regex::Regex;
use sea_query::{Alias, Expr, ExprTrait, Func, PostgresQueryBuilder, Query};
use serde_json::{Map, Value as JsonValue};

/// Field name to value, as handed to a [`Validator`]
pub type Attributes = Map<String, JsonValue>;

/// Checks attributes against rules
pub trait Validator {
    /// Validate `data` against `rules`.
    ///
    /// Returns the failures as a [`MessageBag`]; an empty bag means the data passed.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for malformed or unknown rules and for failed
    /// database probes.
    fn validate(
        &self,
        data: &Attributes,
        rules: &RuleSet,
        messages: &CustomMessages,
        db: &dyn StatementExecutor,
    ) -> Result<MessageBag, ValidationError>;
}

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)+$")
        .expect("email pattern compiles")
});

const RULES: &[&str] = &[
    "required",
    "nullable",
    "string",
    "integer",
    "numeric",
    "boolean",
    "email",
    "alpha",
    "alpha_num",
    "alpha_dash",
    "min",
    "max",
    "between",
    "in",
    "not_in",
    "regex",
    "same",
    "confirmed",
    "unique",
    "exists",
];

/// Built-in rule engine
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleValidator;

impl RuleValidator {
    pub fn new() -> Self {
        Self
    }
}

impl Validator for RuleValidator {
    fn validate(
        &self,
        data: &Attributes,
        rules: &RuleSet,
        messages: &CustomMessages,
        db: &dyn StatementExecutor,
    ) -> Result<MessageBag, ValidationError> {
        for (_, field_rules) in rules.iter() {
            for rule in field_rules {
                check_parameters(rule)?;
            }
        }

        let mut bag = MessageBag::new();
        for (field, field_rules) in rules.iter() {
            let check = FieldCheck {
                field,
                value: data.get(field),
                rules: field_rules,
                data,
                db,
            };
            for rule in field_rules {
                if let Some(failure) = check.run(rule)? {
                    let message = messages
                        .lookup(field, rule.name())
                        .map(str::to_string)
                        .unwrap_or_else(|| default_message(rule.name(), failure));
                    bag.add(field, render(&message, field, rule));
                }
            }
        }
        Ok(bag)
    }
}

fn invalid(rule: &Rule, reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidParameters {
        rule: rule.to_string(),
        reason: reason.into(),
    }
}

fn number_param(rule: &Rule, idx: usize) -> Result<f64, ValidationError> {
    rule.param(idx)
        .and_then(|p| p.parse::<f64>().ok())
        .ok_or_else(|| invalid(rule, format!("parameter {} must be a number", idx + 1)))
}

fn check_parameters(rule: &Rule) -> Result<(), ValidationError> {
    if !RULES.contains(&rule.name()) {
        return Err(ValidationError::UnknownRule(rule.name().to_string()));
    }
    match rule.name() {
        "min" | "max" => number_param(rule, 0).map(|_| ()),
        "between" => {
            let (low, high) = (number_param(rule, 0)?, number_param(rule, 1)?);
            if low > high {
                return Err(invalid(rule, "lower bound exceeds upper bound"));
            }
            Ok(())
        }
        "in" | "not_in" if rule.params().is_empty() => Err(invalid(rule, "expected at least one value")),
        "regex" => compile_pattern(rule).map(|_| ()),
        "same" if rule.param(0).map_or(true, str::is_empty) => Err(invalid(rule, "expected a field name")),
        "unique" | "exists" if rule.param(0).map_or(true, str::is_empty) => {
            Err(invalid(rule, "expected a table name"))
        }
        _ => Ok(()),
    }
}

/// `regex:/pattern/flags` or a bare pattern
fn compile_pattern(rule: &Rule) -> Result<Regex, ValidationError> {
    let raw = rule.param(0).ok_or_else(|| invalid(rule, "expected a pattern"))?;
    let pattern = match raw.strip_prefix('/').and_then(|rest| rest.rsplit_once('/')) {
        Some((body, "")) => body.to_string(),
        Some((body, flags)) if flags.chars().all(|c| "imsxU".contains(c)) => format!("(?{flags}){body}"),
        _ => raw.to_string(),
    };
    Regex::new(&pattern).map_err(|e| invalid(rule, e.to_string()))
}

/// How a size rule measured the value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Failure {
    Plain,
    Numeric,
    String,
    Array,
}

fn is_blank(value: Option<&JsonValue>) -> bool {
    match value {
        None | Some(JsonValue::Null) => true,
        Some(JsonValue::String(s)) => s.trim().is_empty(),
        _ => false,
    }
}

fn as_number(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn is_integer(value: &JsonValue) -> bool {
    match value {
        JsonValue::Number(n) => n.is_i64() || n.is_u64(),
        JsonValue::String(s) => s.trim().parse::<i64>().is_ok(),
        _ => false,
    }
}

fn is_boolean(value: &JsonValue) -> bool {
    match value {
        JsonValue::Bool(_) => true,
        JsonValue::Number(n) => matches!(n.as_i64(), Some(0 | 1)),
        JsonValue::String(s) => matches!(s.as_str(), "0" | "1" | "true" | "false"),
        _ => false,
    }
}

struct FieldCheck<'c> {
    field: &'c str,
    value: Option<&'c JsonValue>,
    rules: &'c FieldRules,
    data: &'c Attributes,
    db: &'c dyn StatementExecutor,
}

impl FieldCheck<'_> {
    /// `Ok(None)` when the rule passes
    fn run(&self, rule: &Rule) -> Result<Option<Failure>, ValidationError> {
        if rule.name() == "required" {
            let missing = match self.value {
                Some(JsonValue::Array(items)) => items.is_empty(),
                other => is_blank(other),
            };
            return Ok(missing.then_some(Failure::Plain));
        }
        let value = match self.value {
            Some(value) if !is_blank(Some(value)) => value,
            _ => return Ok(None),
        };

        let passed = match rule.name() {
            "nullable" => true,
            "string" => value.is_string(),
            "integer" => is_integer(value),
            "numeric" => as_number(value).is_some(),
            "boolean" => is_boolean(value),
            "email" => value.as_str().is_some_and(|s| EMAIL.is_match(s)),
            "alpha" => value.as_str().is_some_and(|s| s.chars().all(char::is_alphabetic)),
            "alpha_num" => value.as_str().is_some_and(|s| s.chars().all(char::is_alphanumeric)),
            "alpha_dash" => value
                .as_str()
                .is_some_and(|s| s.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_')),
            "min" | "max" | "between" => return self.size_rule(rule, value),
            "in" => json_to_text(value).is_some_and(|text| rule.params().contains(&text)),
            "not_in" => json_to_text(value).is_some_and(|text| !rule.params().contains(&text)),
            "regex" => {
                let pattern = compile_pattern(rule)?;
                json_to_text(value).is_some_and(|text| pattern.is_match(&text))
            }
            "same" => rule.param(0).and_then(|other| self.data.get(other)) == Some(value),
            "confirmed" => self.data.get(&format!("{}_confirmation", self.field)) == Some(value),
            "unique" => !self.probe(rule, value, true)?,
            "exists" => self.probe(rule, value, false)?,
            other => return Err(ValidationError::UnknownRule(other.to_string())),
        };
        Ok((!passed).then_some(Failure::Plain))
    }

    fn size_rule(&self, rule: &Rule, value: &JsonValue) -> Result<Option<Failure>, ValidationError> {
        let numeric = self.rules.has("integer") || self.rules.has("numeric");
        let (size, kind) = match value {
            JsonValue::Array(items) => (items.len() as f64, Failure::Array),
            v if numeric => match as_number(v) {
                Some(n) => (n, Failure::Numeric),
                // the type rule reports this
                None => return Ok(None),
            },
            JsonValue::Number(n) => (n.as_f64().unwrap_or(f64::NAN), Failure::Numeric),
            JsonValue::String(s) => (s.chars().count() as f64, Failure::String),
            JsonValue::Object(map) => (map.len() as f64, Failure::Array),
            JsonValue::Bool(_) | JsonValue::Null => return Ok(Some(Failure::Plain)),
        };
        let passed = match rule.name() {
            "min" => size >= number_param(rule, 0)?,
            "max" => size <= number_param(rule, 0)?,
            _ => (number_param(rule, 0)?..=number_param(rule, 1)?).contains(&size),
        };
        Ok((!passed).then_some(kind))
    }

    /// Does a row with this value exist? `unique` also honours its except clause.
    fn probe(&self, rule: &Rule, value: &JsonValue, unique: bool) -> Result<bool, ValidationError> {
        let table = rule.param(0).unwrap_or_default();
        let column = rule.param(1).filter(|c| !c.is_empty()).unwrap_or(self.field);
        let Some(text) = json_to_text(value) else {
            return Ok(false);
        };

        let mut select = Query::select();
        select
            .expr(Expr::cust("1"))
            .from(Alias::new(table))
            .and_where(text_expr(table, column).eq(text))
            .limit(1);
        if unique {
            let except = rule.param(2).filter(|e| !e.is_empty() && !e.eq_ignore_ascii_case("null"));
            if let Some(except) = except {
                let id_column = rule.param(3).filter(|c| !c.is_empty()).unwrap_or("id");
                select.and_where(text_expr(table, id_column).ne(except));
            }
        }

        let (sql, values) = select.build(PostgresQueryBuilder);
        log::debug!("{} probe for {}: {sql}", rule.name(), self.field);
        let rows = self.db.fetch_column(&sql, &values)?;
        Ok(!rows.is_empty())
    }
}

/// `CAST(table.column AS TEXT)`
fn text_expr(table: &str, column: &str) -> Expr {
    Expr::expr(Func::cast_as(column_expr(&qualify(table, column)), Alias::new("TEXT")))
}

fn default_message(rule: &str, failure: Failure) -> String {
    let template = match (rule, failure) {
        ("required", _) => "The :attribute field is required.",
        ("string", _) => "The :attribute must be a string.",
        ("integer", _) => "The :attribute must be an integer.",
        ("numeric", _) => "The :attribute must be a number.",
        ("boolean", _) => "The :attribute field must be true or false.",
        ("email", _) => "The :attribute must be a valid email address.",
        ("alpha", _) => "The :attribute may only contain letters.",
        ("alpha_num", _) => "The :attribute may only contain letters and numbers.",
        ("alpha_dash", _) => "The :attribute may only contain letters, numbers, dashes and underscores.",
        ("min", Failure::String) => "The :attribute must be at least :min characters.",
        ("min", Failure::Array) => "The :attribute must have at least :min items.",
        ("min", _) => "The :attribute must be at least :min.",
        ("max", Failure::String) => "The :attribute may not be greater than :max characters.",
        ("max", Failure::Array) => "The :attribute may not have more than :max items.",
        ("max", _) => "The :attribute may not be greater than :max.",
        ("between", Failure::String) => "The :attribute must be between :min and :max characters.",
        ("between", Failure::Array) => "The :attribute must have between :min and :max items.",
        ("between", _) => "The :attribute must be between :min and :max.",
        ("in" | "not_in" | "exists", _) => "The selected :attribute is invalid.",
        ("regex", _) => "The :attribute format is invalid.",
        ("same", _) => "The :attribute and :other must match.",
        ("confirmed", _) => "The :attribute confirmation does not match.",
        ("unique", _) => "The :attribute has already been taken.",
        _ => "The :attribute is invalid.",
    };
    template.to_string()
}

fn attribute_name(field: &str) -> String {
    field.replace('_', " ")
}

/// Fill `:attribute`, `:min`, `:max`, `:other` and `:values` in `template`
fn render(template: &str, field: &str, rule: &Rule) -> String {
    let (min, max) = match rule.name() {
        "min" => (rule.param(0), None),
        "max" => (None, rule.param(0)),
        "between" => (rule.param(0), rule.param(1)),
        _ => (None, None),
    };
    let mut message = template.replace(":attribute", &attribute_name(field));
    if let Some(min) = min {
        message = message.replace(":min", min);
    }
    if let Some(max) = max {
        message = message.replace(":max", max);
    }
    if rule.name() == "same" {
        if let Some(other) = rule.param(0) {
            message = message.replace(":other", &attribute_name(other));
        }
    }
    if matches!(rule.name(), "in" | "not_in") {
        message = message.replace(":values", &rule.params().join(", "));
    }
    message
}
