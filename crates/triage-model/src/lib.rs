//! Triage Model
//!
//! Document types shared by every part of the case-management core.
//!
//! # Overview
//!
//! - **Ticket**: the case record, persisted as one JSON document
//! - **Artifact**: an observable attached to a ticket, typed on insertion
//! - **Playbook / Task**: the task graph attached to a ticket
//! - **Job**: an automation invocation spawned from a task
//! - **schema**: the JSON schema every persisted ticket must satisfy
//!
//! # Example
//!
//! ```rust
//! use triage_model::{infer_kind, ArtifactKind};
//!
//! assert_eq!(infer_kind("1.2.3.4"), ArtifactKind::Ip);
//! assert_eq!(infer_kind("a@b.com"), ArtifactKind::Email);
//! ```

#![allow(missing_docs)]

pub mod artifact;
pub mod comment;
pub mod error;
pub mod job;
pub mod playbook;
pub mod schema;
pub mod ticket;

// Re-exports
pub use artifact::{infer_kind, Artifact, ArtifactKind};
pub use comment::{Comment, CommentForm};
pub use error::ModelError;
pub use job::{Job, JobForm, JobId, Origin};
pub use playbook::{Playbook, PlaybookTemplate, PlaybookTemplateForm, Task, TaskKind, TaskTemplate};
pub use schema::{validate_document, validate_ticket};
pub use ticket::{
    document_id, AccessList, File, LogEntry, Reference, Ticket, TicketForm, TicketId, TicketList,
    TicketResponse, TicketSummary, TicketWithTickets, TICKET_COLLECTION,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with ticket documents
    pub use crate::{
        Artifact, Comment, CommentForm, Job, JobForm, Playbook, PlaybookTemplateForm, Task,
        Ticket, TicketForm, TicketId, TicketResponse, TicketWithTickets,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
