//! Triage Workflow
//!
//! Playbooks attached to tickets are task DAGs. This crate orders them,
//! derives their ids and turns runnable tasks into automation jobs.
//!
//! # Overview
//!
//! - [`graph`]: deterministic topological order with cycle detection
//! - [`playbook`]: YAML template conversion, kebab-case ids, id disambiguation
//! - [`engine`]: job chaining from the root task or a completed task
//!
//! # Example
//!
//! ```rust
//! use triage_model::{PlaybookTemplate, TaskTemplate, TicketId};
//! use triage_workflow::{from_template, run_root_task, JobQueue};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let playbook = from_template(
//!     PlaybookTemplate::new("Triage")
//!         .with_task("collect", TaskTemplate::new("Collect").with_next(["enrich"]))
//!         .with_task("enrich", TaskTemplate::new("Enrich").with_automation("vt.lookup")),
//! )
//! .unwrap();
//!
//! let queue = JobQueue::new();
//! let jobs = run_root_task(&queue, TicketId(1), "triage", &playbook).await.unwrap();
//! assert_eq!(jobs.len(), 2);
//! assert_eq!(jobs[1].automation, "vt.lookup");
//! # }
//! ```

#![warn(missing_docs)]

pub mod engine;
pub mod error;
pub mod graph;
pub mod playbook;

// Re-exports
pub use engine::{chain_next, job_form, run_root_task, JobQueue, JobSink};
pub use error::{CycleError, WorkflowError};
pub use graph::topological_order;
pub use playbook::{disambiguate, from_form, from_template, parse_template, playbook_id};
