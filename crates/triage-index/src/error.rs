//! Error types for the ticket index

use triage_query::QueryError;

/// Index errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndexError {
    /// Index backend rejected the request
    #[error("index backend error: {0}")]
    Backend(String),

    /// A batch task panicked or was cancelled
    #[error("index task failed: {0}")]
    Task(String),
}

impl From<IndexError> for QueryError {
    fn from(err: IndexError) -> Self {
        QueryError::Search(err.to_string())
    }
}
