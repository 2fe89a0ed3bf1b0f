//! Triage Query
//!
//! Filter queries for ticket listings.
//!
//! User filter text is parsed with a small `nom` grammar, validated against
//! the searchable fields of the index and compiled into a native [`Clause`].
//! Clauses render as backend query text and can be evaluated directly
//! against JSON documents, which is how the in-memory store applies them.
//!
//! # Example
//!
//! ```rust
//! use triage_query::{Compiler, QueryError, Searcher, DEFAULT_PREFIX};
//!
//! struct NoSearch;
//!
//! impl Searcher for NoSearch {
//!     fn fields(&self) -> Vec<String> {
//!         vec!["status".into()]
//!     }
//!     fn search(&self, _term: &str) -> Result<Vec<i64>, QueryError> {
//!         Ok(vec![])
//!     }
//! }
//!
//! let filter = Compiler::new(&NoSearch, DEFAULT_PREFIX).compile("status == 'open'").unwrap();
//! assert_eq!(filter.to_string(), r#"d.status == "open""#);
//! ```

#![warn(missing_docs)]

pub mod clause;
pub mod compiler;
pub mod error;
pub mod parser;

// Re-exports
pub use clause::{compare_values, truthy, Clause, CompareOp, FilterClause, Operand, Vars};
pub use compiler::{Compiler, Searcher, DEFAULT_PREFIX};
pub use error::QueryError;
