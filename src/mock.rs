//! In-memory [`StatementExecutor`] for tests.
//!
//! Results are queued up front and handed out in order; every statement is recorded
//! with its bound values so tests can assert on the exact SQL that ran.
//!
//! ```
//! # #[cfg(feature = "mock")]
//! # fn main() {
//! use lifeguard_related::mock::MockDatabase;
//! use lifeguard_related::StatementExecutor;
//! use sea_query::{Value, Values};
//!
//! let db = MockDatabase::new().append_column_results([vec![Value::from(1)]]);
//! let keys = db.fetch_column("SELECT 1", &Values(vec![])).unwrap();
//! assert_eq!(keys, vec![Value::from(1)]);
//! assert_eq!(db.statements()[0].sql, "SELECT 1");
//! # }
//! # #[cfg(not(feature = "mock"))]
//! # fn main() {}
//! ```

use crate::executor::{LifeError, StatementExecutor};
use sea_query::{Value, Values};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

/// One recorded statement
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedStatement {
    pub sql: String,
    pub values: Vec<Value>,
}

#[derive(Debug, Default)]
struct MockState {
    columns: VecDeque<Result<Vec<Value>, String>>,
    execs: VecDeque<Result<u64, String>>,
    log: Vec<LoggedStatement>,
}

/// Mock database with queued column and exec results
///
/// An empty column queue answers with no rows; an empty exec queue answers with one
/// affected row.
#[derive(Debug, Default)]
pub struct MockDatabase {
    state: Mutex<MockState>,
}

impl MockDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue results for successive `fetch_column` calls
    #[must_use]
    pub fn append_column_results<I>(self, results: I) -> Self
    where
        I: IntoIterator<Item = Vec<Value>>,
    {
        self.lock().columns.extend(results.into_iter().map(Ok));
        self
    }

    /// Queue affected-row counts for successive `execute_statement` calls
    #[must_use]
    pub fn append_exec_results<I>(self, results: I) -> Self
    where
        I: IntoIterator<Item = u64>,
    {
        self.lock().execs.extend(results.into_iter().map(Ok));
        self
    }

    /// Queue a failure for the next `fetch_column` call
    #[must_use]
    pub fn append_column_error(self, message: impl Into<String>) -> Self {
        self.lock().columns.push_back(Err(message.into()));
        self
    }

    /// Queue a failure for the next `execute_statement` call
    #[must_use]
    pub fn append_exec_error(self, message: impl Into<String>) -> Self {
        self.lock().execs.push_back(Err(message.into()));
        self
    }

    /// Statements run so far, oldest first
    pub fn statements(&self) -> Vec<LoggedStatement> {
        self.lock().log.clone()
    }

    pub fn into_statement_log(self) -> Vec<LoggedStatement> {
        self.state
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .log
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn record(state: &mut MockState, sql: &str, values: &Values) {
        state.log.push(LoggedStatement {
            sql: sql.to_string(),
            values: values.0.clone(),
        });
    }
}

impl StatementExecutor for MockDatabase {
    fn fetch_column(&self, sql: &str, values: &Values) -> Result<Vec<Value>, LifeError> {
        let mut state = self.lock();
        Self::record(&mut state, sql, values);
        match state.columns.pop_front() {
            Some(result) => result.map_err(LifeError::QueryError),
            None => Ok(Vec::new()),
        }
    }

    fn execute_statement(&self, sql: &str, values: &Values) -> Result<u64, LifeError> {
        let mut state = self.lock();
        Self::record(&mut state, sql, values);
        match state.execs.pop_front() {
            Some(result) => result.map_err(LifeError::QueryError),
            None => Ok(1),
        }
    }
}
