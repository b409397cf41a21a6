//! Where-clause list and its compilation to sea-query.
//!
//! A [`FilterQuery`](super::FilterQuery) keeps its predicates as an ordered list of
//! [`WhereClause`]s, each carrying the boolean that joins it to the clause before it.
//! The list is compiled with SQL precedence: runs of `AND` clauses are grouped and the
//! groups are joined with `OR`, so `a AND b OR c` means `(a AND b) OR c`.

use super::error::RelationError;
use sea_query::extension::postgres::PgBinOper;
use sea_query::{Alias, BinOper, Condition, Expr, ExprTrait, Value};
use std::fmt;
use std::str::FromStr;

/// Connector between a clause and the clauses before it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Boolean {
    #[default]
    And,
    Or,
}

/// Comparison operator of a column predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
    NotLike,
    ILike,
    NotILike,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "<>",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Like => "like",
            Operator::NotLike => "not like",
            Operator::ILike => "ilike",
            Operator::NotILike => "not ilike",
        }
    }

    fn bin_oper(self) -> BinOper {
        match self {
            Operator::Eq => BinOper::Equal,
            Operator::Ne => BinOper::NotEqual,
            Operator::Lt => BinOper::SmallerThan,
            Operator::Lte => BinOper::SmallerThanOrEqual,
            Operator::Gt => BinOper::GreaterThan,
            Operator::Gte => BinOper::GreaterThanOrEqual,
            Operator::Like => BinOper::Like,
            Operator::NotLike => BinOper::NotLike,
            Operator::ILike => BinOper::PgOperator(PgBinOper::ILike),
            Operator::NotILike => BinOper::PgOperator(PgBinOper::NotILike),
        }
    }

    /// `lhs OP value`
    pub fn apply(self, lhs: Expr, value: Value) -> Expr {
        lhs.binary(self.bin_oper(), Expr::val(value))
    }
}

impl FromStr for Operator {
    type Err = RelationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let op = match s.trim().to_ascii_lowercase().as_str() {
            "=" | "==" => Operator::Eq,
            "<>" | "!=" => Operator::Ne,
            "<" => Operator::Lt,
            "<=" => Operator::Lte,
            ">" => Operator::Gt,
            ">=" => Operator::Gte,
            "like" => Operator::Like,
            "not like" => Operator::NotLike,
            "ilike" => Operator::ILike,
            "not ilike" => Operator::NotILike,
            _ => return Err(RelationError::InvalidOperator(s.to_string())),
        };
        Ok(op)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One predicate in the where-clause list
///
/// Column names are stored table-qualified (`users.id`).
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        column: String,
        operator: Operator,
        value: Value,
    },
    In { column: String, values: Vec<Value> },
    NotIn { column: String, values: Vec<Value> },
    Null { column: String },
    NotNull { column: String },
    /// Parenthesised group of clauses
    Nested(Vec<WhereClause>),
}

/// A predicate plus the boolean joining it to the preceding clause
///
/// The boolean of the first clause in a list is ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    pub boolean: Boolean,
    pub predicate: Predicate,
}

impl WhereClause {
    pub fn new(boolean: Boolean, predicate: Predicate) -> Self {
        Self { boolean, predicate }
    }
}

/// Column expression for `table.column` (or a bare `column`)
pub fn column_expr(column: &str) -> Expr {
    match column.rsplit_once('.') {
        Some((table, name)) => Expr::col((Alias::new(table), Alias::new(name))),
        None => Expr::col(Alias::new(column)),
    }
}

/// Qualify `column` with `table` unless it already names a table
pub fn qualify(table: &str, column: &str) -> String {
    if column.contains('.') {
        column.to_string()
    } else {
        format!("{table}.{column}")
    }
}

fn predicate_condition(predicate: &Predicate) -> Condition {
    match predicate {
        Predicate::Compare {
            column,
            operator,
            value,
        } => Condition::all().add(operator.apply(column_expr(column), value.clone())),
        // An empty IN list matches nothing and an empty NOT IN matches everything
        Predicate::In { values, .. } if values.is_empty() => Condition::all().add(Expr::cust("1 = 0")),
        Predicate::NotIn { values, .. } if values.is_empty() => Condition::all().add(Expr::cust("1 = 1")),
        Predicate::In { column, values } => {
            Condition::all().add(column_expr(column).is_in(values.iter().cloned().map(Expr::val)))
        }
        Predicate::NotIn { column, values } => {
            Condition::all().add(column_expr(column).is_not_in(values.iter().cloned().map(Expr::val)))
        }
        Predicate::Null { column } => Condition::all().add(column_expr(column).is_null()),
        Predicate::NotNull { column } => Condition::all().add(column_expr(column).is_not_null()),
        Predicate::Nested(clauses) => compile(clauses).unwrap_or_else(Condition::all),
    }
}

/// Compile a clause list into a single condition.
///
/// Returns `None` for an empty list.
pub fn compile(clauses: &[WhereClause]) -> Option<Condition> {
    let mut groups: Vec<Condition> = Vec::new();
    for clause in clauses {
        let condition = predicate_condition(&clause.predicate);
        match groups.last_mut() {
            Some(current) if clause.boolean == Boolean::And => {
                *current = std::mem::replace(current, Condition::all()).add(condition);
            }
            _ => groups.push(Condition::all().add(condition)),
        }
    }
    match groups.len() {
        0 => None,
        1 => groups.pop(),
        _ => Some(groups.into_iter().fold(Condition::any(), |any, group| any.add(group))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_query::{PostgresQueryBuilder, Query};

    fn render(clauses: &[WhereClause]) -> String {
        let mut select = Query::select();
        select.column(Alias::new("id")).from(Alias::new("users"));
        if let Some(cond) = compile(clauses) {
            select.cond_where(cond);
        }
        select.to_string(PostgresQueryBuilder)
    }

    fn eq(column: &str, v: i32) -> Predicate {
        Predicate::Compare {
            column: column.into(),
            operator: Operator::Eq,
            value: v.into(),
        }
    }

    #[test]
    fn test_operator_parse() {
        assert_eq!("=".parse::<Operator>().unwrap(), Operator::Eq);
        assert_eq!("!=".parse::<Operator>().unwrap(), Operator::Ne);
        assert_eq!("NOT LIKE".parse::<Operator>().unwrap(), Operator::NotLike);
        assert!(matches!(
            "~~".parse::<Operator>(),
            Err(RelationError::InvalidOperator(op)) if op == "~~"
        ));
    }

    #[test]
    fn test_empty_list_compiles_to_none() {
        assert!(compile(&[]).is_none());
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let sql = render(&[
            WhereClause::new(Boolean::And, eq("users.a", 1)),
            WhereClause::new(Boolean::And, eq("users.b", 2)),
            WhereClause::new(Boolean::Or, eq("users.c", 3)),
        ]);
        assert!(sql.contains(r#""users"."a" = 1"#), "{sql}");
        assert!(sql.contains(" OR "), "{sql}");
        let or_pos = sql.find(" OR ").unwrap();
        let and_pos = sql.find(" AND ").unwrap();
        assert!(and_pos < or_pos, "{sql}");
    }

    #[test]
    fn test_empty_in_lists() {
        let none = render(&[WhereClause::new(
            Boolean::And,
            Predicate::In {
                column: "users.id".into(),
                values: vec![],
            },
        )]);
        assert!(none.contains("1 = 0"), "{none}");
    }

    #[test]
    fn test_qualify() {
        assert_eq!(qualify("users", "id"), "users.id");
        assert_eq!(qualify("users", "posts.id"), "posts.id");
    }
}
