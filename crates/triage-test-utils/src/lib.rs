//! Testing utilities for the triage workspace
//!
//! Shared fixtures, test doubles and store builders.

#![allow(missing_docs)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use serde_json::json;
use triage_index::{IndexError, MemoryIndex, TicketIndex};
use triage_model::{
    Artifact, Job, JobForm, PlaybookTemplateForm, TicketForm, TicketId, TicketSummary,
};
use triage_query::{QueryError, Searcher};
use triage_store::{AccessListHooks, AllowAll, FilterHooks, TicketStore};
use triage_workflow::{JobQueue, JobSink, WorkflowError};

pub const PHISHING_YAML: &str = r#"
name: Phishing
tasks:
  board:
    name: Board involvement?
    type: input
    next: [escalate, mail]
  escalate:
    name: Escalate to CISO
  mail:
    name: Mail header
    type: automation
    automation: hash.sha1
    data:
      payload: { header: true }
    next: [escalate]
"#;

pub const DIAMOND_YAML: &str = r#"
name: Diamond
tasks:
  a:
    name: A
    next: [b, c]
  b:
    name: B
    next: [d]
  c:
    name: C
    next: [d]
  d:
    name: D
"#;

pub const CYCLE_YAML: &str = r#"
name: Loop
tasks:
  a:
    name: A
    next: [b]
  b:
    name: B
    next: [a]
"#;

pub fn alert(name: &str) -> TicketForm {
    TicketForm::new(name, "alert")
}

pub fn alert_with_artifacts(name: &str, artifacts: &[&str]) -> TicketForm {
    artifacts
        .iter()
        .fold(alert(name), |form, artifact| form.with_artifact(Artifact::new(*artifact)))
}

pub fn playbook(yaml: &str) -> PlaybookTemplateForm {
    PlaybookTemplateForm::new(yaml)
}

pub fn summaries(count: usize) -> Vec<TicketSummary> {
    let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    (0..count)
        .map(|i| TicketSummary {
            id: TicketId(i64::try_from(i).unwrap() + 1),
            name: format!("ticket {i}"),
            ticket_type: "alert".into(),
            status: "open".into(),
            owner: None,
            created: at,
            modified: at,
            artifacts: Vec::new(),
            comments: Vec::new(),
            details: Vec::new(),
        })
        .collect()
}

/// Memory index that records the size of every `index` call
#[derive(Debug, Default)]
pub struct RecordingIndex {
    pub inner: MemoryIndex,
    calls: Mutex<Vec<usize>>,
}

impl RecordingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Batch sizes seen so far, sorted ascending
    pub fn batch_sizes(&self) -> Vec<usize> {
        let mut sizes = self.calls.lock().clone();
        sizes.sort_unstable();
        sizes
    }

    pub fn reset(&self) {
        self.calls.lock().clear();
    }
}

impl Searcher for RecordingIndex {
    fn fields(&self) -> Vec<String> {
        self.inner.fields()
    }

    fn search(&self, term: &str) -> Result<Vec<i64>, QueryError> {
        self.inner.search(term)
    }
}

#[async_trait]
impl TicketIndex for RecordingIndex {
    async fn index(&self, summaries: Vec<TicketSummary>) -> Result<(), IndexError> {
        self.calls.lock().push(summaries.len());
        self.inner.index(summaries).await
    }

    async fn delete(&self, ids: &[TicketId]) -> Result<(), IndexError> {
        self.inner.delete(ids).await
    }

    async fn truncate(&self) -> Result<(), IndexError> {
        self.inner.truncate().await
    }
}

/// Job sink that accepts `accept` jobs and refuses the rest
#[derive(Debug, Default)]
pub struct FailingJobSink {
    pub accept: usize,
    pub queue: JobQueue,
}

impl FailingJobSink {
    pub fn new(accept: usize) -> Self {
        Self {
            accept,
            queue: JobQueue::new(),
        }
    }
}

#[async_trait]
impl JobSink for FailingJobSink {
    async fn dispatch(&self, form: JobForm) -> Result<Job, WorkflowError> {
        if self.queue.len() >= self.accept {
            return Err(WorkflowError::Dispatch("job queue unavailable".into()));
        }
        self.queue.dispatch(form).await
    }
}

/// Access-list hooks that stamp every new ticket with the tenant group
pub fn tenant_hooks(tenant: &str) -> AccessListHooks {
    AccessListHooks::new().with_ingestion(json!({
        "read": { "groups": [tenant] },
        "write": { "groups": [tenant] },
    }))
}

/// Store and the doubles behind it
pub struct Harness {
    pub store: TicketStore,
    pub index: Arc<RecordingIndex>,
    pub jobs: Arc<JobQueue>,
}

pub fn harness() -> Harness {
    harness_with_hooks(Arc::new(AllowAll))
}

pub fn harness_with_hooks(hooks: Arc<dyn FilterHooks>) -> Harness {
    let index = Arc::new(RecordingIndex::new());
    let jobs = Arc::new(JobQueue::new());
    let store = TicketStore::new(index.clone(), hooks, jobs.clone());
    Harness { store, index, jobs }
}

/// Task ids of dispatched jobs, in dispatch order
pub fn task_ids(jobs: &[Job]) -> Vec<String> {
    jobs.iter()
        .filter_map(|job| job.origin.as_ref())
        .map(|origin| origin.task_id.clone())
        .collect()
}
