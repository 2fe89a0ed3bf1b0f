//! Error types for the ticket model

/// Errors raised while building or checking ticket documents
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Document violates the ticket schema; one entry per violation
    #[error("validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),

    /// Document could not be (de)serialized
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A ticket key that is not a decimal integer
    #[error("invalid ticket key: {0}")]
    InvalidKey(String),
}

impl ModelError {
    /// Schema violations carried by this error, empty for other kinds
    #[inline]
    #[must_use]
    pub fn violations(&self) -> &[String] {
        match self {
            Self::Validation(v) => v,
            _ => &[],
        }
    }
}
