//! Automation jobs spawned from playbook tasks

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::ticket::TicketId;

/// Unique job identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    /// Generate new job ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Task that spawned a job
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Origin {
    pub ticket_id: TicketId,
    pub playbook_id: String,
    pub task_id: String,
}

/// Job as requested by the workflow engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobForm {
    /// Automation to run
    pub automation: String,
    /// Input handed to the automation
    #[serde(default)]
    pub payload: Value,
    /// Task the job reports back to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Origin>,
}

/// Queued job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub automation: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Origin>,
    pub created: DateTime<Utc>,
}

impl Job {
    /// Materialize a requested job
    #[must_use]
    pub fn from_form(form: JobForm) -> Self {
        Self {
            id: JobId::new(),
            automation: form.automation,
            payload: form.payload,
            origin: form.origin,
            created: Utc::now(),
        }
    }
}
