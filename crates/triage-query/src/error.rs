//! Error types for filter queries

/// Filter compilation and evaluation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    /// Query text does not parse; deliberately carries no detail
    #[error("invalid filter query: syntax error")]
    Syntax,

    /// Query parses but references something that does not exist
    #[error("invalid filter query: {0}")]
    InvalidFilter(String),

    /// Clause references a bind parameter with no value
    #[error("unbound parameter: @{0}")]
    UnboundParameter(String),

    /// Free-text search backend failed
    #[error("search failed: {0}")]
    Search(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax_error_has_generic_message() {
        assert_eq!(QueryError::Syntax.to_string(), "invalid filter query: syntax error");
    }

    #[test]
    fn invalid_filter_names_the_problem() {
        let err = QueryError::InvalidFilter("unknown field: foo".into());
        assert_eq!(err.to_string(), "invalid filter query: unknown field: foo");
    }
}
