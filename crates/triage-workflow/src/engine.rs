//! Job chaining
//!
//! Starting from a set of tasks, the engine walks `next` edges depth-first
//! with an explicit worklist and dispatches one job for every reachable task
//! that is not done yet. The walk stops at the first dispatch failure; jobs
//! dispatched before it stay dispatched.

use std::collections::HashSet;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::mpsc;
use triage_model::{Job, JobForm, Origin, Playbook, Task, TicketId};

use crate::error::WorkflowError;

/// Destination of automation jobs
#[async_trait]
pub trait JobSink: Send + Sync {
    /// Enqueue a job
    async fn dispatch(&self, form: JobForm) -> Result<Job, WorkflowError>;
}

/// In-memory job queue
///
/// Dispatched jobs are kept for listing and streamed to the single receiver
/// an executor can take with [`JobQueue::take_receiver`].
#[derive(Debug)]
pub struct JobQueue {
    tx: mpsc::UnboundedSender<Job>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<Job>>>,
    jobs: RwLock<Vec<Job>>,
}

impl JobQueue {
    /// Create empty queue
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
            jobs: RwLock::new(Vec::new()),
        }
    }

    /// Take the job stream; `None` once taken
    pub fn take_receiver(&self) -> Option<mpsc::UnboundedReceiver<Job>> {
        self.rx.lock().take()
    }

    /// All jobs dispatched so far, oldest first
    #[must_use]
    pub fn jobs(&self) -> Vec<Job> {
        self.jobs.read().clone()
    }

    /// Number of dispatched jobs
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    /// Check if nothing was dispatched
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobSink for JobQueue {
    async fn dispatch(&self, form: JobForm) -> Result<Job, WorkflowError> {
        let job = Job::from_form(form);
        self.jobs.write().push(job.clone());
        if self.tx.send(job.clone()).is_err() {
            tracing::debug!(job = %job.id, "job receiver dropped, job kept for listing only");
        }
        Ok(job)
    }
}

/// Dispatch jobs for the root task of a playbook and everything after it
///
/// # Errors
/// - `WorkflowError::MissingRoot` when no task has order 0
/// - the first dispatch failure
pub async fn run_root_task(
    sink: &dyn JobSink,
    ticket_id: TicketId,
    playbook_id: &str,
    playbook: &Playbook,
) -> Result<Vec<Job>, WorkflowError> {
    let (root, _) = playbook
        .root_task()
        .ok_or_else(|| WorkflowError::MissingRoot(playbook_id.to_string()))?;
    chain(sink, ticket_id, playbook_id, playbook, vec![root.to_string()]).await
}

/// Dispatch jobs for the successors of a completed task
///
/// # Errors
/// - `WorkflowError::UnknownTask` when `task_id` is not in the playbook
/// - the first dispatch failure
pub async fn chain_next(
    sink: &dyn JobSink,
    ticket_id: TicketId,
    playbook_id: &str,
    playbook: &Playbook,
    task_id: &str,
) -> Result<Vec<Job>, WorkflowError> {
    let task = playbook
        .task(task_id)
        .ok_or_else(|| WorkflowError::UnknownTask {
            task: task_id.to_string(),
            referenced_by: playbook_id.to_string(),
        })?;
    chain(sink, ticket_id, playbook_id, playbook, task.next.clone()).await
}

async fn chain(
    sink: &dyn JobSink,
    ticket_id: TicketId,
    playbook_id: &str,
    playbook: &Playbook,
    start: Vec<String>,
) -> Result<Vec<Job>, WorkflowError> {
    let mut worklist: Vec<String> = start.into_iter().rev().collect();
    let mut visited = HashSet::new();
    let mut jobs = Vec::new();

    while let Some(task_id) = worklist.pop() {
        if !visited.insert(task_id.clone()) {
            continue;
        }
        let task = playbook
            .task(&task_id)
            .ok_or_else(|| WorkflowError::UnknownTask {
                task: task_id.clone(),
                referenced_by: playbook_id.to_string(),
            })?;

        if !task.done {
            let origin = Origin {
                ticket_id,
                playbook_id: playbook_id.to_string(),
                task_id: task_id.clone(),
            };
            let job = sink.dispatch(job_form(&task_id, task, origin)).await?;
            tracing::debug!(ticket = %ticket_id, playbook = playbook_id, task = %task_id, job = %job.id, "dispatched job");
            jobs.push(job);
        }

        worklist.extend(task.next.iter().rev().cloned());
    }

    tracing::info!(ticket = %ticket_id, playbook = playbook_id, jobs = jobs.len(), "chained playbook tasks");
    Ok(jobs)
}

/// Job request for a task
///
/// Automation is the task's own, else `data.automation`, else the task id.
/// Payload is `data.payload`, else the whole `data`, else `null`.
#[must_use]
pub fn job_form(task_id: &str, task: &Task, origin: Origin) -> JobForm {
    let data = task.data.as_ref();
    let automation = task
        .automation
        .clone()
        .or_else(|| {
            data.and_then(|d| d.get("automation"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| task_id.to_string());
    let payload = data
        .map(|d| d.get("payload").cloned().unwrap_or_else(|| d.clone()))
        .unwrap_or(Value::Null);

    JobForm {
        automation,
        payload,
        origin: Some(origin),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playbook::from_template;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use triage_model::{PlaybookTemplate, TaskTemplate};

    struct Refusing {
        accept: usize,
        inner: JobQueue,
    }

    #[async_trait]
    impl JobSink for Refusing {
        async fn dispatch(&self, form: JobForm) -> Result<Job, WorkflowError> {
            if self.inner.len() >= self.accept {
                return Err(WorkflowError::Dispatch("queue full".into()));
            }
            self.inner.dispatch(form).await
        }
    }

    fn diamond() -> Playbook {
        from_template(
            PlaybookTemplate::new("Diamond")
                .with_task("a", TaskTemplate::new("A").with_next(["b", "c"]))
                .with_task("b", TaskTemplate::new("B").with_next(["d"]))
                .with_task("c", TaskTemplate::new("C").with_next(["d"]))
                .with_task("d", TaskTemplate::new("D")),
        )
        .unwrap()
    }

    fn task_ids(jobs: &[Job]) -> Vec<String> {
        jobs.iter()
            .map(|j| j.origin.as_ref().unwrap().task_id.clone())
            .collect()
    }

    #[tokio::test]
    async fn root_chain_visits_each_task_once() {
        let queue = JobQueue::new();
        let jobs = run_root_task(&queue, TicketId(1), "diamond", &diamond()).await.unwrap();

        assert_eq!(task_ids(&jobs), vec!["a", "b", "d", "c"]);
        assert_eq!(queue.len(), 4);
        assert_eq!(jobs[0].origin.as_ref().unwrap().ticket_id, TicketId(1));
    }

    #[tokio::test]
    async fn done_tasks_are_skipped_but_traversed() {
        let mut playbook = diamond();
        playbook.tasks["a"].done = true;
        playbook.tasks["b"].done = true;

        let queue = JobQueue::new();
        let jobs = run_root_task(&queue, TicketId(1), "diamond", &playbook).await.unwrap();
        assert_eq!(task_ids(&jobs), vec!["d", "c"]);
    }

    #[tokio::test]
    async fn chain_next_starts_after_completed_task() {
        let queue = JobQueue::new();
        let jobs = chain_next(&queue, TicketId(1), "diamond", &diamond(), "b").await.unwrap();
        assert_eq!(task_ids(&jobs), vec!["d"]);

        let err = chain_next(&queue, TicketId(1), "diamond", &diamond(), "zz").await.unwrap_err();
        assert!(matches!(err, WorkflowError::UnknownTask { .. }));
    }

    #[tokio::test]
    async fn dispatch_failure_abandons_the_walk() {
        let sink = Refusing {
            accept: 2,
            inner: JobQueue::new(),
        };
        let err = run_root_task(&sink, TicketId(1), "diamond", &diamond()).await.unwrap_err();

        assert_eq!(err, WorkflowError::Dispatch("queue full".into()));
        assert_eq!(task_ids(&sink.inner.jobs()), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn receiver_streams_jobs() {
        let queue = JobQueue::new();
        let mut rx = queue.take_receiver().unwrap();
        assert!(queue.take_receiver().is_none());

        run_root_task(&queue, TicketId(7), "diamond", &diamond()).await.unwrap();
        let first = rx.recv().await.unwrap();
        assert_eq!(first.automation, "a");
    }

    #[test]
    fn job_form_resolution() {
        let origin = Origin {
            ticket_id: TicketId(1),
            playbook_id: "p".into(),
            task_id: "t".into(),
        };
        let mut task = diamond().tasks["a"].clone();

        assert_eq!(job_form("t", &task, origin.clone()).automation, "t");
        assert_eq!(job_form("t", &task, origin.clone()).payload, Value::Null);

        task.data = Some(json!({"automation": "vt.lookup", "payload": {"ip": "1.2.3.4"}}));
        let form = job_form("t", &task, origin.clone());
        assert_eq!(form.automation, "vt.lookup");
        assert_eq!(form.payload, json!({"ip": "1.2.3.4"}));

        task.data = Some(json!({"ip": "1.2.3.4"}));
        task.automation = Some("whois".into());
        let form = job_form("t", &task, origin);
        assert_eq!(form.automation, "whois");
        assert_eq!(form.payload, json!({"ip": "1.2.3.4"}));
    }
}
