//! `FilterQuery`: the query under construction for one model.
//!
//! Plain column filters live here; relationship filters are in
//! [`related`](super::related). Every builder method consumes the query and returns
//! it, so calls chain:
//!
//! ```no_run
//! use lifeguard_related::{FilterQuery, Operator, Schema, StatementExecutor};
//! # fn example(schema: &Schema, db: &dyn StatementExecutor) -> Result<(), lifeguard_related::RelationError> {
//! let query = FilterQuery::new(schema, "User", db)?
//!     .where_column("active", Operator::Eq, true)
//!     .where_related("posts", "title", Operator::Like, "%rust%")?;
//! let (sql, values) = query.build();
//! # Ok(())
//! # }
//! ```

use super::clause::{self, qualify, Boolean, Operator, Predicate, WhereClause};
use super::error::RelationError;
use crate::executor::{LifeError, LifeExecutor, StatementExecutor};
use crate::schema::{ModelDef, Schema};
use crate::value_conversion::with_converted_params;
use may_postgres::Row;
use sea_query::{Alias, Asterisk, Order, PostgresQueryBuilder, Query, SelectStatement, Value, Values};

/// Trait for types that can be built from a result row
pub trait FromRow: Sized {
    /// Build `Self` from a row returned by `FilterQuery::all`
    ///
    /// # Errors
    ///
    /// Returns the `may_postgres` error of the first column that fails to decode.
    fn from_row(row: &Row) -> Result<Self, may_postgres::Error>;
}

/// Query over one model's table
///
/// Holds the schema it resolves relations against and the executor used for
/// relationship lookups. Both are borrowed for the lifetime of the query.
pub struct FilterQuery<'a> {
    pub(crate) schema: &'a Schema,
    pub(crate) model: &'a ModelDef,
    pub(crate) db: &'a dyn StatementExecutor,
    pub(crate) wheres: Vec<WhereClause>,
    orders: Vec<(String, Order)>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl std::fmt::Debug for FilterQuery<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterQuery")
            .field("model", &self.model.name())
            .field("wheres", &self.wheres)
            .field("orders", &self.orders)
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .finish()
    }
}

impl Schema {
    /// Start a [`FilterQuery`] on `model`.
    ///
    /// # Errors
    ///
    /// Returns `RelationError::UnknownModel` if `model` is not registered.
    pub fn query<'a>(
        &'a self,
        model: &str,
        db: &'a dyn StatementExecutor,
    ) -> Result<FilterQuery<'a>, RelationError> {
        FilterQuery::new(self, model, db)
    }
}

impl<'a> FilterQuery<'a> {
    /// New query on `model`.
    ///
    /// Models declared with [`ModelDef::soft_deletes`] start with a
    /// `deleted_at IS NULL` clause; otherwise the query has no clauses.
    ///
    /// # Errors
    ///
    /// Returns `RelationError::UnknownModel` if `model` is not registered.
    pub fn new(
        schema: &'a Schema,
        model: &str,
        db: &'a dyn StatementExecutor,
    ) -> Result<Self, RelationError> {
        let model = schema.model(model)?;
        let query = Self::for_model(schema, model, db);
        Ok(match model.deleted_at_column() {
            Some(column) => query.where_null(column, Boolean::And),
            None => query,
        })
    }

    /// New query on `model` that includes soft-deleted rows.
    ///
    /// # Errors
    ///
    /// Returns `RelationError::UnknownModel` if `model` is not registered.
    pub fn with_trashed(
        schema: &'a Schema,
        model: &str,
        db: &'a dyn StatementExecutor,
    ) -> Result<Self, RelationError> {
        Ok(Self::for_model(schema, schema.model(model)?, db))
    }

    pub(crate) fn for_model(schema: &'a Schema, model: &'a ModelDef, db: &'a dyn StatementExecutor) -> Self {
        Self {
            schema,
            model,
            db,
            wheres: Vec::new(),
            orders: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Fresh query on the same model, schema and executor
    pub(crate) fn scoped(&self) -> Self {
        Self::for_model(self.schema, self.model, self.db)
    }

    pub fn model(&self) -> &'a ModelDef {
        self.model
    }

    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    /// The where-clause list in insertion order
    pub fn wheres(&self) -> &[WhereClause] {
        &self.wheres
    }

    /// Append a raw clause
    #[must_use]
    pub fn push_where(mut self, boolean: Boolean, predicate: Predicate) -> Self {
        self.wheres.push(WhereClause::new(boolean, predicate));
        self
    }

    fn column(&self, column: &str) -> String {
        qualify(self.model.table(), column)
    }

    /// `AND column OP value`; unqualified columns belong to this model's table
    #[must_use]
    pub fn where_column(self, column: &str, operator: Operator, value: impl Into<Value>) -> Self {
        let column = self.column(column);
        self.push_where(
            Boolean::And,
            Predicate::Compare {
                column,
                operator,
                value: value.into(),
            },
        )
    }

    /// `OR column OP value`
    #[must_use]
    pub fn or_where_column(self, column: &str, operator: Operator, value: impl Into<Value>) -> Self {
        let column = self.column(column);
        self.push_where(
            Boolean::Or,
            Predicate::Compare {
                column,
                operator,
                value: value.into(),
            },
        )
    }

    #[must_use]
    pub fn where_in<V, I>(self, column: &str, values: I, boolean: Boolean) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        let column = self.column(column);
        let values = values.into_iter().map(Into::into).collect();
        self.push_where(boolean, Predicate::In { column, values })
    }

    #[must_use]
    pub fn where_not_in<V, I>(self, column: &str, values: I, boolean: Boolean) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        let column = self.column(column);
        let values = values.into_iter().map(Into::into).collect();
        self.push_where(boolean, Predicate::NotIn { column, values })
    }

    #[must_use]
    pub fn where_null(self, column: &str, boolean: Boolean) -> Self {
        let column = self.column(column);
        self.push_where(boolean, Predicate::Null { column })
    }

    #[must_use]
    pub fn where_not_null(self, column: &str, boolean: Boolean) -> Self {
        let column = self.column(column);
        self.push_where(boolean, Predicate::NotNull { column })
    }

    #[must_use]
    pub fn order_by(mut self, column: &str, order: Order) -> Self {
        let column = self.column(column);
        self.orders.push((column, order));
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    fn base_statement(&self) -> SelectStatement {
        let mut select = Query::select();
        select.from(Alias::new(self.model.table()));
        if let Some(condition) = clause::compile(&self.wheres) {
            select.cond_where(condition);
        }
        for (column, order) in &self.orders {
            select.order_by_expr(clause::column_expr(column), order.clone());
        }
        if let Some(limit) = self.limit {
            select.limit(limit);
        }
        if let Some(offset) = self.offset {
            select.offset(offset);
        }
        select
    }

    /// `SELECT * FROM table WHERE ...`
    pub fn statement(&self) -> SelectStatement {
        let mut select = self.base_statement();
        select.column(Asterisk);
        select
    }

    /// PostgreSQL text and bound values of [`statement`](Self::statement)
    pub fn build(&self) -> (String, Values) {
        self.statement().build(PostgresQueryBuilder)
    }

    /// PostgreSQL text with values inlined (for logs and tests)
    pub fn to_sql(&self) -> String {
        self.statement().to_string(PostgresQueryBuilder)
    }

    /// Primary-key values of every matching row.
    ///
    /// # Errors
    ///
    /// Returns `LifeError` if the query fails.
    pub fn keys(&self) -> Result<Vec<Value>, LifeError> {
        let mut select = self.base_statement();
        select.expr(clause::column_expr(&self.column(self.model.key_name())));
        let (sql, values) = select.build(PostgresQueryBuilder);
        log::debug!("{sql}");
        self.db.fetch_column(&sql, &values)
    }

    /// Run the query and map every row with [`FromRow`].
    ///
    /// # Errors
    ///
    /// Returns `LifeError` if the query fails or a row does not decode.
    pub fn all<M, E>(&self, executor: &E) -> Result<Vec<M>, LifeError>
    where
        M: FromRow,
        E: LifeExecutor + ?Sized,
    {
        let (sql, values) = self.build();
        log::debug!("{sql}");
        with_converted_params(&values, |params| {
            let rows = executor.query_all(&sql, params)?;
            rows.iter()
                .map(|row| {
                    M::from_row(row).map_err(|e| LifeError::ParseError(format!("Failed to parse row: {e}")))
                })
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockDatabase;
    use crate::schema::{ModelDef, Schema};

    fn schema() -> Schema {
        Schema::builder().model(ModelDef::new("User", "users")).build()
    }

    #[test]
    fn test_unknown_model() {
        let schema = schema();
        let db = MockDatabase::new();
        assert!(matches!(
            FilterQuery::new(&schema, "Ghost", &db),
            Err(RelationError::UnknownModel(m)) if m == "Ghost"
        ));
    }

    #[test]
    fn test_soft_deleting_model_starts_scoped() {
        let schema = Schema::builder()
            .model(ModelDef::new("User", "users").soft_deletes("deleted_at"))
            .build();
        let db = MockDatabase::new();

        let live = schema.query("User", &db).unwrap();
        assert_eq!(live.to_sql(), r#"SELECT * FROM "users" WHERE "users"."deleted_at" IS NULL"#);

        let all = FilterQuery::with_trashed(&schema, "User", &db).unwrap();
        assert!(all.wheres().is_empty());
    }

    #[test]
    fn test_column_filters_render() {
        let schema = schema();
        let db = MockDatabase::new();
        let sql = schema
            .query("User", &db)
            .unwrap()
            .where_column("age", Operator::Gte, 18)
            .or_where_column("admin", Operator::Eq, true)
            .order_by("name", Order::Asc)
            .limit(10)
            .to_sql();
        assert_eq!(
            sql,
            r#"SELECT * FROM "users" WHERE "users"."age" >= 18 OR "users"."admin" = TRUE ORDER BY "users"."name" ASC LIMIT 10"#
        );
    }

    #[test]
    fn test_keys_selects_primary_key() {
        let schema = schema();
        let db = MockDatabase::new().append_column_results([vec![Value::from(3), Value::from(9)]]);
        let keys = schema
            .query("User", &db)
            .unwrap()
            .where_null("deleted_at", Boolean::And)
            .keys()
            .unwrap();
        assert_eq!(keys, vec![Value::from(3), Value::from(9)]);
        let log = db.statements();
        assert_eq!(log.len(), 1);
        assert_eq!(
            log[0].sql,
            r#"SELECT "users"."id" FROM "users" WHERE "users"."deleted_at" IS NULL"#
        );
    }

    #[test]
    fn test_build_binds_values() {
        let schema = schema();
        let db = MockDatabase::new();
        let (sql, values) = schema
            .query("User", &db)
            .unwrap()
            .where_in("id", [1, 2], Boolean::And)
            .build();
        assert_eq!(sql, r#"SELECT * FROM "users" WHERE "users"."id" IN ($1, $2)"#);
        assert_eq!(values.0, vec![Value::from(1), Value::from(2)]);
    }
}
