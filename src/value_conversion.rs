//! Conversions between sea-query values and `may_postgres`.
//!
//! Outbound: [`with_converted_params`] turns the `Values` produced by
//! `PostgresQueryBuilder` into `ToSql` parameters for the duration of a closure.
//! Inbound: [`row_column_value`] decodes a result column back into a `Value`.
//! [`value_to_json`] and [`value_to_param`] render values for the validation layer.

use crate::executor::LifeError;
use bytes::BytesMut;
use may_postgres::types::{IsNull, ToSql, Type};
use may_postgres::Row;
use postgres_types::to_sql_checked;
use sea_query::{Value, Values};
use serde_json::Value as JsonValue;
use std::error::Error;

/// A NULL parameter that binds to any column type.
///
/// sea-query keeps the Rust type of a NULL (`Value::Int(None)`), which does not
/// necessarily match the column it is bound to; PostgreSQL only needs the null flag.
#[derive(Debug)]
struct SqlNull;

impl ToSql for SqlNull {
    fn to_sql(&self, _ty: &Type, _out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        Ok(IsNull::Yes)
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

fn to_sql_param(value: &Value) -> Result<Box<dyn ToSql>, LifeError> {
    let param: Box<dyn ToSql> = match value {
        Value::Bool(Some(b)) => Box::new(*b),
        Value::TinyInt(Some(i)) => Box::new(i16::from(*i)),
        Value::SmallInt(Some(i)) => Box::new(*i),
        Value::Int(Some(i)) => Box::new(*i),
        Value::BigInt(Some(i)) => Box::new(*i),
        Value::TinyUnsigned(Some(u)) => Box::new(i16::from(*u)),
        Value::SmallUnsigned(Some(u)) => Box::new(i32::from(*u)),
        Value::Unsigned(Some(u)) => Box::new(i64::from(*u)),
        Value::BigUnsigned(Some(u)) => {
            let signed = i64::try_from(*u).map_err(|_| {
                LifeError::Other(format!(
                    "BigUnsigned value {u} exceeds i64::MAX ({}), cannot be safely cast to i64",
                    i64::MAX
                ))
            })?;
            Box::new(signed)
        }
        Value::Float(Some(f)) => Box::new(*f),
        Value::Double(Some(d)) => Box::new(*d),
        Value::String(Some(s)) => Box::new(s.to_string()),
        Value::Bytes(Some(b)) => Box::new(b.to_vec()),
        Value::Json(Some(j)) => {
            let json: &JsonValue = j;
            Box::new(json.clone())
        }
        Value::Uuid(Some(u)) => {
            let id: &uuid::Uuid = u;
            Box::new(*id)
        }
        Value::ChronoDate(Some(d)) => {
            let date: &chrono::NaiveDate = d;
            Box::new(*date)
        }
        Value::ChronoDateTime(Some(t)) => {
            let at: &chrono::NaiveDateTime = t;
            Box::new(*at)
        }
        Value::ChronoDateTimeUtc(Some(t)) => {
            let at: &chrono::DateTime<chrono::Utc> = t;
            Box::new(*at)
        }
        Value::Bool(None)
        | Value::TinyInt(None)
        | Value::SmallInt(None)
        | Value::Int(None)
        | Value::BigInt(None)
        | Value::TinyUnsigned(None)
        | Value::SmallUnsigned(None)
        | Value::Unsigned(None)
        | Value::BigUnsigned(None)
        | Value::Float(None)
        | Value::Double(None)
        | Value::String(None)
        | Value::Bytes(None)
        | Value::Json(None)
        | Value::Uuid(None)
        | Value::ChronoDate(None)
        | Value::ChronoDateTime(None)
        | Value::ChronoDateTimeUtc(None) => Box::new(SqlNull),
        other => {
            return Err(LifeError::Other(format!(
                "Unsupported value type in query: {other:?}"
            )))
        }
    };
    Ok(param)
}

/// Convert sea-query values to `may_postgres` parameters and run `f` with them.
///
/// The boxed parameters live for the duration of the closure only.
///
/// # Errors
///
/// Returns `LifeError::Other` for value types with no PostgreSQL mapping, or whatever
/// `f` returns.
pub fn with_converted_params<F, R>(values: &Values, f: F) -> Result<R, LifeError>
where
    F: FnOnce(&[&dyn ToSql]) -> Result<R, LifeError>,
{
    let owned = values
        .0
        .iter()
        .map(to_sql_param)
        .collect::<Result<Vec<_>, _>>()?;
    let params: Vec<&dyn ToSql> = owned.iter().map(|p| p.as_ref()).collect();
    f(&params)
}

/// Decode column `idx` of `row` into a sea-query `Value`.
///
/// # Errors
///
/// Returns `LifeError::ParseError` when the column type is not supported or the
/// value fails to decode.
pub fn row_column_value(row: &Row, idx: usize) -> Result<Value, LifeError> {
    let column = row
        .columns()
        .get(idx)
        .ok_or_else(|| LifeError::ParseError(format!("column index {idx} out of range")))?;
    let ty = column.type_().clone();
    let parse = |e: may_postgres::Error| {
        LifeError::ParseError(format!("Failed to decode column {}: {e}", column.name()))
    };

    let value = if ty == Type::BOOL {
        Value::from(row.try_get::<_, Option<bool>>(idx).map_err(parse)?)
    } else if ty == Type::INT2 {
        Value::from(row.try_get::<_, Option<i16>>(idx).map_err(parse)?)
    } else if ty == Type::INT4 {
        Value::from(row.try_get::<_, Option<i32>>(idx).map_err(parse)?)
    } else if ty == Type::INT8 {
        Value::from(row.try_get::<_, Option<i64>>(idx).map_err(parse)?)
    } else if ty == Type::FLOAT4 {
        Value::from(row.try_get::<_, Option<f32>>(idx).map_err(parse)?)
    } else if ty == Type::FLOAT8 {
        Value::from(row.try_get::<_, Option<f64>>(idx).map_err(parse)?)
    } else if ty == Type::TEXT || ty == Type::VARCHAR || ty == Type::BPCHAR || ty == Type::NAME {
        Value::from(row.try_get::<_, Option<String>>(idx).map_err(parse)?)
    } else if ty == Type::UUID {
        Value::from(row.try_get::<_, Option<uuid::Uuid>>(idx).map_err(parse)?)
    } else if ty == Type::JSON || ty == Type::JSONB {
        Value::from(row.try_get::<_, Option<JsonValue>>(idx).map_err(parse)?)
    } else {
        return Err(LifeError::ParseError(format!(
            "Unsupported column type {ty} for column {}",
            column.name()
        )));
    };
    Ok(value)
}

/// Render a value as JSON for the validation layer. NULLs of any type become `null`.
pub fn value_to_json(value: &Value) -> JsonValue {
    match value {
        Value::Bool(Some(b)) => JsonValue::Bool(*b),
        Value::TinyInt(Some(i)) => JsonValue::from(*i),
        Value::SmallInt(Some(i)) => JsonValue::from(*i),
        Value::Int(Some(i)) => JsonValue::from(*i),
        Value::BigInt(Some(i)) => JsonValue::from(*i),
        Value::TinyUnsigned(Some(u)) => JsonValue::from(*u),
        Value::SmallUnsigned(Some(u)) => JsonValue::from(*u),
        Value::Unsigned(Some(u)) => JsonValue::from(*u),
        Value::BigUnsigned(Some(u)) => JsonValue::from(*u),
        Value::Float(Some(f)) => JsonValue::from(f64::from(*f)),
        Value::Double(Some(d)) => JsonValue::from(*d),
        Value::String(Some(s)) => JsonValue::String(s.to_string()),
        Value::Json(Some(j)) => {
            let json: &JsonValue = j;
            json.clone()
        }
        Value::Uuid(Some(u)) => JsonValue::String(u.to_string()),
        Value::ChronoDate(Some(d)) => JsonValue::String(d.to_string()),
        Value::ChronoDateTime(Some(t)) => JsonValue::String(t.to_string()),
        Value::ChronoDateTimeUtc(Some(t)) => JsonValue::String(t.to_rfc3339()),
        _ => JsonValue::Null,
    }
}

/// Render a value as a rule parameter (`unique:users,email,42`).
///
/// Returns `None` for NULL values.
pub fn value_to_param(value: &Value) -> Option<String> {
    match value_to_json(value) {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// Convert a JSON scalar into the text form used for database comparisons.
pub(crate) fn json_to_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Bool(b) => Some(b.to_string()),
        JsonValue::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}
