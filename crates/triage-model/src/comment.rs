//! Ticket comments

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Comment stored on a ticket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Author user id
    pub creator: String,
    /// Creation time
    pub created: DateTime<Utc>,
    /// Comment body
    pub message: String,
}

/// Comment as submitted by a caller
///
/// `creator` falls back to the acting user and `created` to the current time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentForm {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    pub message: String,
}

impl CommentForm {
    /// Comment with only a body
    #[inline]
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            creator: None,
            created: None,
            message: message.into(),
        }
    }

    /// With explicit author
    #[inline]
    #[must_use]
    pub fn with_creator(mut self, creator: impl Into<String>) -> Self {
        self.creator = Some(creator.into());
        self
    }

    /// Resolve into a stored comment
    #[must_use]
    pub fn into_comment(self, creator: String, now: DateTime<Utc>) -> Comment {
        Comment {
            creator,
            created: self.created.unwrap_or(now),
            message: self.message,
        }
    }
}
