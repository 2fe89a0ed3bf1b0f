//! Tickets and the views derived from them

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::artifact::Artifact;
use crate::comment::Comment;
use crate::error::ModelError;
use crate::playbook::{Playbook, PlaybookTemplateForm};

/// Collection name used in document ids (`tickets/<key>`)
pub const TICKET_COLLECTION: &str = "tickets";

/// Unique ticket identifier
///
/// Stored as the decimal string key of the ticket document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(pub i64);

impl TicketId {
    /// Document key
    #[inline]
    #[must_use]
    pub fn key(&self) -> String {
        self.0.to_string()
    }

    /// Parse a document key
    ///
    /// # Errors
    /// `ModelError::InvalidKey` when the key is not a decimal integer
    pub fn from_key(key: &str) -> Result<Self, ModelError> {
        key.parse::<i64>()
            .map(Self)
            .map_err(|_| ModelError::InvalidKey(key.to_string()))
    }

    /// Document id (`tickets/<key>`)
    #[inline]
    #[must_use]
    pub fn document_id(&self) -> String {
        document_id(*self)
    }
}

impl std::fmt::Display for TicketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Document id of a ticket
#[inline]
#[must_use]
pub fn document_id(id: TicketId) -> String {
    format!("{TICKET_COLLECTION}/{}", id.0)
}

/// Users and groups granted access to a ticket
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessList {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
}

/// Link to an external resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub href: String,
    pub name: String,
}

/// Metadata of a file kept in object storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    /// Object storage key
    pub key: String,
    pub name: String,
}

/// Persisted ticket document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub status: String,
    #[serde(rename = "type")]
    pub ticket_type: String,
    /// Free-form details, validated by `schema` outside the core
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Map<String, Value>>,
    /// JSON schema of `details`, as a string
    pub schema: String,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<Comment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<Reference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<File>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub playbooks: IndexMap<String, Playbook>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read: Option<AccessList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write: Option<AccessList>,
}

impl Ticket {
    /// Names of all artifacts, in insertion order
    #[must_use]
    pub fn artifact_names(&self) -> Vec<&str> {
        self.artifacts.iter().map(|a| a.name.as_str()).collect()
    }
}

/// Ticket as submitted for creation
///
/// Unset timestamps, schema and status are defaulted by the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TicketForm {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(rename = "type")]
    pub ticket_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub references: Vec<Reference>,
    #[serde(default)]
    pub files: Vec<File>,
    #[serde(default)]
    pub playbooks: Vec<PlaybookTemplateForm>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read: Option<AccessList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write: Option<AccessList>,
}

impl TicketForm {
    /// Form with name and type
    #[must_use]
    pub fn new(name: impl Into<String>, ticket_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ticket_type: ticket_type.into(),
            ..Self::default()
        }
    }

    /// With explicit id
    #[inline]
    #[must_use]
    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    /// With status
    #[inline]
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    /// With owner
    #[inline]
    #[must_use]
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Append an artifact
    #[inline]
    #[must_use]
    pub fn with_artifact(mut self, artifact: Artifact) -> Self {
        self.artifacts.push(artifact);
        self
    }

    /// Append a playbook template
    #[inline]
    #[must_use]
    pub fn with_playbook(mut self, playbook: PlaybookTemplateForm) -> Self {
        self.playbooks.push(playbook);
        self
    }

    /// With details document
    #[inline]
    #[must_use]
    pub fn with_details(mut self, details: Map<String, Value>) -> Self {
        self.details = Some(details);
        self
    }

    /// With read access list
    #[inline]
    #[must_use]
    pub fn with_read(mut self, read: AccessList) -> Self {
        self.read = Some(read);
        self
    }

    /// With write access list
    #[inline]
    #[must_use]
    pub fn with_write(mut self, write: AccessList) -> Self {
        self.write = Some(write);
        self
    }
}

/// Ticket together with its id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketResponse {
    pub id: TicketId,
    #[serde(flatten)]
    pub ticket: Ticket,
}

impl TicketResponse {
    /// JSON document as seen by filters, including the `id` field
    ///
    /// # Errors
    /// Serialization failure
    pub fn to_document(&self) -> Result<Value, ModelError> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Activity log line for a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Document id the entry belongs to
    pub reference: String,
    pub creator: String,
    pub created: DateTime<Utc>,
    pub message: String,
}

/// Ticket enriched with related tickets and its activity log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketWithTickets {
    #[serde(flatten)]
    pub ticket: TicketResponse,
    /// Related tickets, ascending by id
    pub tickets: Vec<TicketResponse>,
    pub logs: Vec<LogEntry>,
}

impl TicketWithTickets {
    /// Ids of the related tickets
    #[must_use]
    pub fn related_ids(&self) -> Vec<TicketId> {
        self.tickets.iter().map(|t| t.id).collect()
    }
}

/// One page of a ticket listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketList {
    /// Size of the whole filtered set
    pub count: usize,
    pub tickets: Vec<TicketResponse>,
}

/// Searchable projection of a ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketSummary {
    pub id: TicketId,
    pub name: String,
    #[serde(rename = "type")]
    pub ticket_type: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    #[serde(default)]
    pub artifacts: Vec<String>,
    #[serde(default)]
    pub comments: Vec<String>,
    /// Flattened string values of `details`
    #[serde(default)]
    pub details: Vec<String>,
}

impl TicketSummary {
    /// Project a ticket
    #[must_use]
    pub fn from_ticket(id: TicketId, ticket: &Ticket) -> Self {
        let mut details = Vec::new();
        if let Some(map) = &ticket.details {
            for value in map.values() {
                collect_strings(value, &mut details);
            }
        }

        Self {
            id,
            name: ticket.name.clone(),
            ticket_type: ticket.ticket_type.clone(),
            status: ticket.status.clone(),
            owner: ticket.owner.clone(),
            created: ticket.created,
            modified: ticket.modified,
            artifacts: ticket.artifacts.iter().map(|a| a.name.clone()).collect(),
            comments: ticket.comments.iter().map(|c| c.message.clone()).collect(),
            details,
        }
    }
}

impl From<&TicketResponse> for TicketSummary {
    fn from(value: &TicketResponse) -> Self {
        Self::from_ticket(value.id, &value.ticket)
    }
}

fn collect_strings(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.push(s.clone()),
        Value::Number(n) => out.push(n.to_string()),
        Value::Array(items) => items.iter().for_each(|v| collect_strings(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_strings(v, out)),
        Value::Bool(_) | Value::Null => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ticket() -> Ticket {
        let now = Utc::now();
        Ticket {
            name: "Phishing".into(),
            owner: None,
            status: "open".into(),
            ticket_type: "alert".into(),
            details: json!({"sender": "x@y.com", "nested": {"score": 7}})
                .as_object()
                .cloned(),
            schema: "{}".into(),
            created: now,
            modified: now,
            artifacts: vec![Artifact::new("evil.com")],
            comments: Vec::new(),
            references: Vec::new(),
            files: Vec::new(),
            playbooks: IndexMap::new(),
            read: None,
            write: None,
        }
    }

    #[test]
    fn key_round_trips() {
        let id = TicketId(42);
        assert_eq!(id.key(), "42");
        assert_eq!(TicketId::from_key("42").unwrap(), id);
        assert!(TicketId::from_key("x42").is_err());
        assert_eq!(id.document_id(), "tickets/42");
    }

    #[test]
    fn response_document_carries_id_and_type() {
        let response = TicketResponse {
            id: TicketId(7),
            ticket: ticket(),
        };
        let doc = response.to_document().unwrap();
        assert_eq!(doc["id"], 7);
        assert_eq!(doc["type"], "alert");
        assert_eq!(doc["artifacts"][0]["name"], "evil.com");
    }

    #[test]
    fn summary_flattens_details() {
        let summary = TicketSummary::from_ticket(TicketId(1), &ticket());
        assert_eq!(summary.artifacts, vec!["evil.com".to_string()]);
        assert_eq!(summary.details, vec!["x@y.com".to_string(), "7".to_string()]);
    }
}
