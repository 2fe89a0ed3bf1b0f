//! Error types for the ticket store

use triage_index::IndexError;
use triage_model::ModelError;
use triage_query::QueryError;
use triage_workflow::{CycleError, WorkflowError};

/// Store operation errors
///
/// Component errors are folded into this taxonomy so callers can match on
/// the kind of failure without knowing which component raised it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// Document violates the ticket schema or an input is malformed
    #[error("validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),

    /// Document is missing or hidden by the read/write filter
    #[error("not found: {0}")]
    NotFound(String),

    /// Filter query does not parse
    #[error("invalid filter query: syntax error")]
    Syntax,

    /// Filter query references unknown fields or parameters
    #[error("invalid filter query: {0}")]
    InvalidFilter(String),

    /// Playbook task graph has a cycle
    #[error(transparent)]
    Cycle(#[from] CycleError),

    /// Caller may not perform the operation
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Request was cancelled
    #[error("operation canceled")]
    Canceled,

    /// Request deadline passed
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// Explicit id already exists
    #[error("conflict: {0}")]
    Conflict(String),

    /// Storage, index or job backend failure
    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether retrying the same request may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Backend(_) | Self::DeadlineExceeded)
    }

    /// Whether the error is caused by the request itself
    #[inline]
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::NotFound(_)
                | Self::Syntax
                | Self::InvalidFilter(_)
                | Self::Cycle(_)
                | Self::AccessDenied(_)
                | Self::Conflict(_)
        )
    }
}

impl From<ModelError> for StoreError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::Validation(violations) => Self::Validation(violations),
            ModelError::InvalidKey(key) => Self::Validation(vec![format!("invalid ticket key: {key}")]),
            ModelError::Serialization(e) => Self::Backend(e.to_string()),
        }
    }
}

impl From<QueryError> for StoreError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::Syntax => Self::Syntax,
            QueryError::InvalidFilter(msg) => Self::InvalidFilter(msg),
            QueryError::UnboundParameter(_) => Self::InvalidFilter(err.to_string()),
            QueryError::Search(msg) => Self::Backend(msg),
        }
    }
}

impl From<WorkflowError> for StoreError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::Cycle(cycle) => Self::Cycle(cycle),
            WorkflowError::Dispatch(msg) => Self::Backend(msg),
            other @ (WorkflowError::UnknownTask { .. }
            | WorkflowError::EmptyPlaybook(_)
            | WorkflowError::MissingRoot(_)
            | WorkflowError::Template(_)) => Self::Validation(vec![other.to_string()]),
        }
    }
}

impl From<IndexError> for StoreError {
    fn from(err: IndexError) -> Self {
        Self::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Backend(err.to_string())
    }
}
