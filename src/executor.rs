//! Executor layer.
//!
//! Two traits live here:
//!
//! - [`LifeExecutor`] runs raw SQL with `may_postgres` parameters and returns rows.
//!   [`MayPostgresExecutor`] is the production implementation.
//! - [`StatementExecutor`] runs a statement built by sea-query and returns either the
//!   values of its first column or the number of affected rows. This is the handle the
//!   relation translator and validating models receive at construction. Every
//!   `LifeExecutor` is a `StatementExecutor` through a blanket implementation, and tests
//!   substitute an in-memory one (see [`crate::mock`]).

use crate::value_conversion::{row_column_value, with_converted_params};
use may_postgres::types::ToSql;
use may_postgres::{Client, Error as PostgresError, Row};
use sea_query::{Value, Values};
use std::fmt;
use std::time::Instant;

#[cfg(feature = "tracing")]
use crate::tracing_helpers;

/// `LifeExecutor` error type
#[derive(Debug)]
pub enum LifeError {
    /// `PostgreSQL` error from `may_postgres`
    PostgresError(PostgresError),
    /// Query execution error
    QueryError(String),
    /// Row parsing/conversion error
    ParseError(String),
    /// Other execution errors
    Other(String),
}

impl fmt::Display for LifeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifeError::PostgresError(e) => write!(f, "PostgreSQL error: {e}"),
            LifeError::QueryError(s) => write!(f, "Query error: {s}"),
            LifeError::ParseError(s) => write!(f, "Parse error: {s}"),
            LifeError::Other(s) => write!(f, "Execution error: {s}"),
        }
    }
}

impl std::error::Error for LifeError {}

impl From<PostgresError> for LifeError {
    fn from(err: PostgresError) -> Self {
        LifeError::PostgresError(err)
    }
}

/// Trait for executing raw SQL against PostgreSQL
///
/// Parameters use `$1`, `$2`, ... placeholders, as produced by sea-query's
/// `PostgresQueryBuilder`.
pub trait LifeExecutor {
    /// Execute a statement and return the number of rows affected
    ///
    /// # Errors
    ///
    /// Returns `LifeError` if the statement fails.
    fn execute(&self, query: &str, params: &[&dyn ToSql]) -> Result<u64, LifeError>;

    /// Execute a query and return all rows
    ///
    /// # Errors
    ///
    /// Returns `LifeError` if the query fails.
    fn query_all(&self, query: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>, LifeError>;
}

/// Executes statements built by sea-query
///
/// Relation lookups only read one column back (primary keys, `RETURNING` ids,
/// uniqueness probes); persistence reads the affected row count.
pub trait StatementExecutor {
    /// Run a query and collect the value of the first column of every row
    ///
    /// # Errors
    ///
    /// Returns `LifeError` if the query fails or a column type cannot be decoded.
    fn fetch_column(&self, sql: &str, values: &Values) -> Result<Vec<Value>, LifeError>;

    /// Run a statement and return the number of rows affected
    ///
    /// # Errors
    ///
    /// Returns `LifeError` if the statement fails.
    fn execute_statement(&self, sql: &str, values: &Values) -> Result<u64, LifeError>;
}

impl<T: LifeExecutor + ?Sized> StatementExecutor for T {
    fn fetch_column(&self, sql: &str, values: &Values) -> Result<Vec<Value>, LifeError> {
        let rows = with_converted_params(values, |params| self.query_all(sql, params))?;
        rows.iter().map(|row| row_column_value(row, 0)).collect()
    }

    fn execute_statement(&self, sql: &str, values: &Values) -> Result<u64, LifeError> {
        with_converted_params(values, |params| self.execute(sql, params))
    }
}

/// Implementation of `LifeExecutor` for `may_postgres::Client`
pub struct MayPostgresExecutor {
    client: Client,
    log_statements: bool,
}

impl MayPostgresExecutor {
    /// Create a new executor from a `may_postgres::Client`
    pub fn new(client: Client) -> Self {
        Self {
            client,
            log_statements: false,
        }
    }

    /// Log every statement at `debug` level before it runs
    #[must_use]
    pub fn with_statement_logging(mut self, enabled: bool) -> Self {
        self.log_statements = enabled;
        self
    }

    /// Get a reference to the underlying client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Consume the executor and return the underlying client
    pub fn into_client(self) -> Client {
        self.client
    }

    fn trace(&self, query: &str, started: Instant) {
        if self.log_statements {
            log::debug!("{query} ({:?})", started.elapsed());
        }
    }
}

impl LifeExecutor for MayPostgresExecutor {
    fn execute(&self, query: &str, params: &[&dyn ToSql]) -> Result<u64, LifeError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::execute_query_span(query).entered();

        let start = Instant::now();
        let result = self.client.execute(query, params).map_err(LifeError::PostgresError);
        self.trace(query, start);
        result
    }

    fn query_all(&self, query: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>, LifeError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::execute_query_span(query).entered();

        let start = Instant::now();
        let result = self.client.query(query, params).map_err(LifeError::PostgresError);
        self.trace(query, start);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_life_error_display() {
        let err = LifeError::QueryError("test query error".to_string());
        let display = err.to_string();
        assert!(display.contains("Query error"));
        assert!(display.contains("test query error"));
    }

    #[test]
    fn test_life_error_all_variants() {
        // PostgresError needs a live connection to construct
        assert!(LifeError::ParseError("x".into()).to_string().contains("Parse error"));
        assert!(LifeError::Other("x".into()).to_string().contains("Execution error"));
    }
}
