//! Relationship filters: `where_related` and friends.
//!
//! A relationship filter such as
//!
//! ```text
//! users.where_related("posts.comments", "approved", Operator::Eq, true)
//! ```
//!
//! is translated in two steps. First a lookup query is built that selects the base
//! table's primary key, joins along every hop of the path and applies the terminal
//! comparison on the last related table:
//!
//! ```sql
//! SELECT DISTINCT "users"."id" FROM "users"
//!   INNER JOIN "posts" ON "users"."id" = "posts"."user_id"
//!   INNER JOIN "comments" ON "posts"."id" = "comments"."post_id"
//!  WHERE "comments"."approved" = $1
//! ```
//!
//! It runs once, and the returned keys are folded back into the base query as a
//! membership predicate (`IN`, `NOT IN`, or `IS NULL` when nothing matched).
//!
//! Negated filters exclude the keys of records that match the positive relation. For
//! has-many relations where some children match and others don't, the record is
//! excluded; this is not a true anti-join.

use super::clause::{column_expr, qualify, Boolean, Operator, Predicate};
use super::error::RelationError;
use super::filter::FilterQuery;
use crate::schema::{ModelDef, RelationKind};
use crate::value_conversion::value_to_param;
use sea_query::{Alias, ExprTrait, PostgresQueryBuilder, Query, SelectStatement, Value};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "tracing")]
use crate::tracing_helpers;

/// Dotted relationship path such as `posts.comments`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationPath {
    segments: Vec<String>,
}

impl RelationPath {
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always false: a parsed path has at least one segment.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl FromStr for RelationPath {
    type Err = RelationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(RelationError::InvalidRelationPath(s.to_string()));
        }
        let segments: Vec<String> = trimmed.split('.').map(|seg| seg.trim().to_string()).collect();
        if segments.iter().any(String::is_empty) {
            return Err(RelationError::InvalidRelationPath(s.to_string()));
        }
        Ok(Self { segments })
    }
}

impl fmt::Display for RelationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

/// `INNER JOIN table ON left = right`, with both sides table-qualified
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinClause {
    pub table: String,
    pub left: String,
    pub right: String,
}

impl JoinClause {
    fn new(table: &str, left: String, right: String) -> Self {
        Self {
            table: table.to_string(),
            left,
            right,
        }
    }

    fn apply(&self, select: &mut SelectStatement) {
        select.inner_join(
            Alias::new(self.table.as_str()),
            column_expr(&self.left).eq(column_expr(&self.right)),
        );
    }
}

/// Joins that connect `parent_table` to `related_table` for one relation hop.
///
/// Returns `None` for kinds with no join translation (`HasManyThrough`, `MorphTo`).
pub fn join_clauses(
    parent_table: &str,
    parent_key: &str,
    related_table: &str,
    kind: &RelationKind,
) -> Option<Vec<JoinClause>> {
    let joins = match kind {
        RelationKind::BelongsTo { foreign_key } => vec![JoinClause::new(
            related_table,
            qualify(related_table, parent_key),
            qualify(parent_table, foreign_key),
        )],
        RelationKind::HasOne { foreign_key }
        | RelationKind::HasMany { foreign_key }
        | RelationKind::MorphOne { foreign_key, .. }
        | RelationKind::MorphMany { foreign_key, .. } => vec![JoinClause::new(
            related_table,
            qualify(parent_table, parent_key),
            qualify(related_table, foreign_key),
        )],
        RelationKind::BelongsToMany {
            pivot_table,
            foreign_key,
            other_key,
        } => vec![
            JoinClause::new(
                pivot_table,
                qualify(parent_table, parent_key),
                qualify(pivot_table, foreign_key),
            ),
            JoinClause::new(
                related_table,
                qualify(related_table, parent_key),
                qualify(pivot_table, other_key),
            ),
        ],
        RelationKind::HasManyThrough { .. } | RelationKind::MorphTo { .. } => return None,
    };
    Some(joins)
}

/// Distinct non-null primary keys returned by one lookup
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeySet(Vec<Value>);

impl KeySet {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn into_values(self) -> Vec<Value> {
        self.0
    }
}

impl FromIterator<Value> for KeySet {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        let mut seen = HashSet::new();
        let keys = iter
            .into_iter()
            .filter(|value| value_to_param(value).is_some_and(|text| seen.insert(text)))
            .collect();
        KeySet(keys)
    }
}

/// Build the lookup statement for `path` starting at `base`.
///
/// # Errors
///
/// `UnknownRelation`, `UnknownModel` or `UnsupportedRelationKind` for the first hop
/// that cannot be resolved.
pub fn lookup_statement(
    query: &FilterQuery<'_>,
    path: &RelationPath,
    column: &str,
    operator: Operator,
    value: Value,
) -> Result<SelectStatement, RelationError> {
    let base = query.model;
    let mut select = Query::select();
    select
        .distinct()
        .expr(column_expr(&qualify(base.table(), base.key_name())))
        .from(Alias::new(base.table()));

    let mut current: &ModelDef = base;
    for name in path.segments() {
        let (relation, related) = query.schema.resolve(current, name)?;
        let joins = join_clauses(current.table(), current.key_name(), related.table(), &relation.kind)
            .ok_or_else(|| RelationError::UnsupportedRelationKind {
                model: current.name().to_string(),
                relation: name.clone(),
                kind: relation.kind.name(),
            })?;
        for join in &joins {
            join.apply(&mut select);
        }
        current = related;
    }

    select.and_where(operator.apply(column_expr(&qualify(current.table(), column)), value));
    Ok(select)
}

impl<'a> FilterQuery<'a> {
    /// Records with at least one related record where `column OP value`.
    ///
    /// # Errors
    ///
    /// Fails on an invalid path, an unknown model or relation, an unsupported relation
    /// kind, or a failed lookup query.
    pub fn where_related(
        self,
        path: &str,
        column: &str,
        operator: Operator,
        value: impl Into<Value>,
    ) -> Result<Self, RelationError> {
        self.where_related_with(path, column, operator, value, Boolean::And, false)
    }

    /// `OR` form of [`where_related`](Self::where_related).
    ///
    /// # Errors
    ///
    /// As [`where_related`](Self::where_related).
    pub fn or_where_related(
        self,
        path: &str,
        column: &str,
        operator: Operator,
        value: impl Into<Value>,
    ) -> Result<Self, RelationError> {
        self.where_related_with(path, column, operator, value, Boolean::Or, false)
    }

    /// Records whose key is not among those matching the positive relation.
    ///
    /// # Errors
    ///
    /// As [`where_related`](Self::where_related).
    pub fn where_not_related(
        self,
        path: &str,
        column: &str,
        operator: Operator,
        value: impl Into<Value>,
    ) -> Result<Self, RelationError> {
        self.where_related_with(path, column, operator, value, Boolean::And, true)
    }

    /// `OR` form of [`where_not_related`](Self::where_not_related).
    ///
    /// # Errors
    ///
    /// As [`where_related`](Self::where_related).
    pub fn or_where_not_related(
        self,
        path: &str,
        column: &str,
        operator: Operator,
        value: impl Into<Value>,
    ) -> Result<Self, RelationError> {
        self.where_related_with(path, column, operator, value, Boolean::Or, true)
    }

    /// General form of the relationship filters.
    ///
    /// Runs exactly one lookup query through the query's executor. Every other error
    /// is detected before that query is issued.
    ///
    /// # Errors
    ///
    /// As [`where_related`](Self::where_related).
    pub fn where_related_with(
        self,
        path: &str,
        column: &str,
        operator: Operator,
        value: impl Into<Value>,
        boolean: Boolean,
        negated: bool,
    ) -> Result<Self, RelationError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::where_related_span(self.model.name(), path, negated).entered();

        let path: RelationPath = path.parse()?;
        let lookup = lookup_statement(&self, &path, column, operator, value.into())?;
        let (sql, values) = lookup.build(PostgresQueryBuilder);
        log::debug!("where_related {}.{path}: {sql}", self.model.name());

        let keys: KeySet = self.db.fetch_column(&sql, &values)?.into_iter().collect();
        log::debug!("where_related {}.{path}: {} matching keys", self.model.name(), keys.len());

        let key_column = qualify(self.model.table(), self.model.key_name());
        let query = match (keys.is_empty(), negated) {
            (true, true) => self,
            (true, false) => self.push_where(boolean, Predicate::Null { column: key_column }),
            (false, true) => self.push_where(
                boolean,
                Predicate::NotIn {
                    column: key_column,
                    values: keys.into_values(),
                },
            ),
            (false, false) => self.push_where(
                boolean,
                Predicate::In {
                    column: key_column,
                    values: keys.into_values(),
                },
            ),
        };
        Ok(query)
    }

    /// Group the clauses added by `build` in parentheses.
    ///
    /// `build` receives a fresh query on the same model with no clauses. If it adds
    /// none, this query is returned unchanged. Relationship filters inside `build` run
    /// their own lookups; the grouping itself issues no query.
    ///
    /// # Errors
    ///
    /// Whatever `build` returns.
    pub fn where_related_nested<F>(self, boolean: Boolean, build: F) -> Result<Self, RelationError>
    where
        F: FnOnce(FilterQuery<'a>) -> Result<FilterQuery<'a>, RelationError>,
    {
        let nested = build(self.scoped())?;
        if nested.wheres.is_empty() {
            return Ok(self);
        }
        Ok(self.push_where(boolean, Predicate::Nested(nested.wheres)))
    }

    /// `OR` form of [`where_related_nested`](Self::where_related_nested).
    ///
    /// # Errors
    ///
    /// Whatever `build` returns.
    pub fn or_where_related_nested<F>(self, build: F) -> Result<Self, RelationError>
    where
        F: FnOnce(FilterQuery<'a>) -> Result<FilterQuery<'a>, RelationError>,
    {
        self.where_related_nested(Boolean::Or, build)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockDatabase;
    use crate::schema::{RelationDef, Schema};

    fn schema() -> Schema {
        Schema::builder()
            .model(
                ModelDef::new("User", "users")
                    .relation("posts", RelationDef::has_many("Post", "user_id"))
                    .relation("roles", RelationDef::belongs_to_many("Role", "role_user", "user_id", "role_id")),
            )
            .model(
                ModelDef::new("Post", "posts")
                    .relation("author", RelationDef::belongs_to("User", "user_id"))
                    .relation("comments", RelationDef::morph_many("Comment", "commentable")),
            )
            .model(ModelDef::new("Comment", "comments"))
            .model(ModelDef::new("Role", "roles"))
            .build()
    }

    #[test]
    fn test_path_parse() {
        let path: RelationPath = "posts.comments".parse().unwrap();
        assert_eq!(path.segments(), ["posts", "comments"]);
        assert_eq!(path.to_string(), "posts.comments");
        assert!(matches!("".parse::<RelationPath>(), Err(RelationError::InvalidRelationPath(_))));
        assert!(matches!("a..b".parse::<RelationPath>(), Err(RelationError::InvalidRelationPath(_))));
    }

    #[test]
    fn test_join_table() {
        let belongs = join_clauses(
            "posts",
            "id",
            "users",
            &RelationKind::BelongsTo {
                foreign_key: "user_id".into(),
            },
        )
        .unwrap();
        assert_eq!(belongs, vec![JoinClause::new("users", "users.id".into(), "posts.user_id".into())]);

        let pivot = join_clauses(
            "users",
            "id",
            "roles",
            &RelationKind::BelongsToMany {
                pivot_table: "role_user".into(),
                foreign_key: "user_id".into(),
                other_key: "role_id".into(),
            },
        )
        .unwrap();
        assert_eq!(
            pivot,
            vec![
                JoinClause::new("role_user", "users.id".into(), "role_user.user_id".into()),
                JoinClause::new("roles", "roles.id".into(), "role_user.role_id".into()),
            ]
        );

        assert!(join_clauses(
            "users",
            "id",
            "posts",
            &RelationKind::MorphTo {
                morph_type: "t".into(),
                foreign_key: "id".into()
            }
        )
        .is_none());
    }

    #[test]
    fn test_lookup_statement_two_hops() {
        let schema = schema();
        let db = MockDatabase::new();
        let query = schema.query("User", &db).unwrap();
        let path = "posts.comments".parse().unwrap();
        let sql = lookup_statement(&query, &path, "body", Operator::Like, "%spam%".into())
            .unwrap()
            .to_string(PostgresQueryBuilder);
        assert_eq!(
            sql,
            r#"SELECT DISTINCT "users"."id" FROM "users" INNER JOIN "posts" ON "users"."id" = "posts"."user_id" INNER JOIN "comments" ON "posts"."id" = "comments"."commentable_id" WHERE "comments"."body" LIKE '%spam%'"#
        );
    }

    #[test]
    fn test_key_set_drops_nulls_and_duplicates() {
        let keys: KeySet = vec![Value::from(1), Value::Int(None), Value::from(1), Value::from(2)]
            .into_iter()
            .collect();
        assert_eq!(keys.values(), [Value::from(1), Value::from(2)]);
    }

    #[test]
    fn test_key_set_handles_large_lookups() {
        let keys: KeySet = (0..40_000).chain(0..40_000).map(Value::from).collect();
        assert_eq!(keys.len(), 40_000);
        assert_eq!(keys.values()[39_999], Value::from(39_999));
    }

    #[test]
    fn test_where_related_appends_in() {
        let schema = schema();
        let db = MockDatabase::new().append_column_results([vec![Value::from(4), Value::from(7)]]);
        let query = schema
            .query("User", &db)
            .unwrap()
            .where_related("posts", "title", Operator::Eq, "hello")
            .unwrap();
        assert_eq!(
            query.wheres()[0].predicate,
            Predicate::In {
                column: "users.id".into(),
                values: vec![Value::from(4), Value::from(7)],
            }
        );
        assert_eq!(query.wheres()[0].boolean, Boolean::And);
        assert_eq!(db.statements().len(), 1);
    }

    #[test]
    fn test_empty_key_set() {
        let schema = schema();
        let db = MockDatabase::new().append_column_results([vec![], vec![]]);
        let negated = schema
            .query("User", &db)
            .unwrap()
            .where_not_related("roles", "name", Operator::Eq, "admin")
            .unwrap();
        assert!(negated.wheres().is_empty());

        let positive = schema
            .query("User", &db)
            .unwrap()
            .or_where_related("roles", "name", Operator::Eq, "admin")
            .unwrap();
        assert_eq!(
            positive.wheres()[0],
            crate::query::WhereClause::new(
                Boolean::Or,
                Predicate::Null {
                    column: "users.id".into()
                }
            )
        );
    }

    #[test]
    fn test_unsupported_kind_runs_no_query() {
        let schema = Schema::builder()
            .model(ModelDef::new("Comment", "comments").relation(
                "commentable",
                RelationDef::new(
                    RelationKind::MorphTo {
                        morph_type: "commentable_type".into(),
                        foreign_key: "commentable_id".into(),
                    },
                    "Post",
                ),
            ))
            .model(ModelDef::new("Post", "posts"))
            .build();
        let db = MockDatabase::new();
        let err = schema
            .query("Comment", &db)
            .unwrap()
            .where_related("commentable", "id", Operator::Eq, 1)
            .unwrap_err();
        assert!(matches!(
            err,
            RelationError::UnsupportedRelationKind { ref model, ref relation, kind: "MorphTo" }
                if model == "Comment" && relation == "commentable"
        ));
        assert!(db.statements().is_empty());
    }

    #[test]
    fn test_nested_without_clauses_is_noop() {
        let schema = schema();
        let db = MockDatabase::new();
        let query = schema
            .query("User", &db)
            .unwrap()
            .where_related_nested(Boolean::And, Ok)
            .unwrap();
        assert!(query.wheres().is_empty());
        assert!(db.statements().is_empty());
    }
}
