//! Query compiler
//!
//! Turns user filter text into a native [`Clause`]. Field references are
//! checked against the searchable fields of the index and free-text terms are
//! resolved through the index into an id membership test.

use serde_json::Value;

use crate::clause::{Clause, FilterClause, Operand};
use crate::error::QueryError;
use crate::parser::{self, Expr};

/// Default document variable prefix
pub const DEFAULT_PREFIX: &str = "d.";

/// Full-text search capability the compiler relies on
pub trait Searcher: Send + Sync {
    /// Top-level field names a filter may reference
    fn fields(&self) -> Vec<String>;

    /// Ids of tickets matching a free-text term
    ///
    /// # Errors
    /// `QueryError::Search` when the backend fails
    fn search(&self, term: &str) -> Result<Vec<i64>, QueryError>;
}

/// Filter compiler bound to a searcher and a document prefix
pub struct Compiler<'a, S: ?Sized> {
    searcher: &'a S,
    prefix: String,
}

impl<'a, S> Compiler<'a, S>
where
    S: Searcher + ?Sized,
{
    /// Create a compiler
    #[must_use]
    pub fn new(searcher: &'a S, prefix: impl Into<String>) -> Self {
        Self {
            searcher,
            prefix: prefix.into(),
        }
    }

    /// Compile a filter query; blank input yields [`FilterClause::all`]
    ///
    /// # Errors
    /// - `QueryError::Syntax` when the text does not parse
    /// - `QueryError::InvalidFilter` for unknown fields or non-string patterns
    /// - `QueryError::Search` when a free-text term cannot be resolved
    pub fn compile(&self, query: &str) -> Result<FilterClause, QueryError> {
        let Some(expr) = parser::parse(query)? else {
            return Ok(FilterClause::all());
        };

        let fields = self.searcher.fields();
        let clause = self.lower(expr, &fields)?;
        tracing::debug!(query, filter = %clause, "compiled filter query");
        Ok(FilterClause::from_clause(clause))
    }

    fn lower(&self, expr: Expr, fields: &[String]) -> Result<Clause, QueryError> {
        match expr {
            Expr::And(left, right) => Ok(Clause::and([
                self.lower(*left, fields)?,
                self.lower(*right, fields)?,
            ])),
            Expr::Or(left, right) => Ok(Clause::or([
                self.lower(*left, fields)?,
                self.lower(*right, fields)?,
            ])),
            Expr::Not(inner) => Ok(Clause::not(self.lower(*inner, fields)?)),
            Expr::Compare { field, op, value } => Ok(Clause::Compare {
                left: self.field(field, fields)?,
                op,
                right: Operand::Literal(value),
            }),
            Expr::Like { field, pattern } => {
                let left = self.field(field, fields)?;
                if !pattern.is_string() {
                    return Err(QueryError::InvalidFilter(format!(
                        "LIKE pattern must be a string, got {pattern}"
                    )));
                }
                Ok(Clause::Like {
                    left,
                    pattern: Operand::Literal(pattern),
                })
            }
            Expr::In {
                field,
                values,
                negated,
            } => Ok(Clause::In {
                left: self.field(field, fields)?,
                list: Operand::Literal(Value::Array(values)),
                negated,
            }),
            Expr::Term(term) => {
                let ids = self.searcher.search(&term)?;
                tracing::debug!(term = %term, hits = ids.len(), "resolved free-text term");
                Ok(Clause::is_in(
                    Operand::Field {
                        prefix: self.prefix.clone(),
                        path: vec!["id".to_string()],
                    },
                    Operand::Literal(Value::Array(ids.into_iter().map(Value::from).collect())),
                ))
            }
        }
    }

    fn field(&self, path: Vec<String>, fields: &[String]) -> Result<Operand, QueryError> {
        let known = path
            .first()
            .is_some_and(|head| fields.iter().any(|f| f == head));
        if !known {
            return Err(QueryError::InvalidFilter(format!(
                "unknown field: {}",
                path.join(".")
            )));
        }
        Ok(Operand::Field {
            prefix: self.prefix.clone(),
            path,
        })
    }
}
