//! Triage Store
//!
//! Ticket graph store of the case-management core.
//!
//! # Overview
//!
//! - [`TicketStore`]: ticket CRUD, listing, field-level edits, playbooks,
//!   relation edges and the activity log
//! - [`FilterHooks`]: access control injected at construction
//! - [`RequestContext`]: acting user, groups, cancellation and deadline
//! - [`MemoryBackend`]: document collection, relation table and artifact index
//! - [`StoreConfig`]: tuning knobs, loadable from TOML
//!
//! Writes publish [`triage_bus::ChangeEvent`]s on the store's bus;
//! [`TicketStore::spawn_index_sync`] keeps the search index in step with them.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use triage_index::MemoryIndex;
//! use triage_model::TicketForm;
//! use triage_store::{AllowAll, RequestContext, TicketStore};
//! use triage_workflow::JobQueue;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store = TicketStore::new(
//!     Arc::new(MemoryIndex::new()),
//!     Arc::new(AllowAll),
//!     Arc::new(JobQueue::new()),
//! );
//! let ctx = RequestContext::for_user("bob");
//!
//! let created = store.create(&ctx, vec![TicketForm::new("Phishing", "alert")]).await.unwrap();
//! let view = store.get(&ctx, created[0].id).await.unwrap();
//! assert_eq!(view.ticket.ticket.status, "open");
//! # }
//! ```

#![warn(missing_docs)]

pub mod backend;
pub mod config;
pub mod context;
pub mod error;
pub mod hooks;
pub mod store;
mod sync;
pub mod telemetry;

// Re-exports
pub use backend::{Cursor, MemoryBackend};
pub use config::{ConfigError, StoreConfig};
pub use context::RequestContext;
pub use error::StoreError;
pub use hooks::{merge_document, AccessListHooks, AllowAll, FilterHooks};
pub use store::{ListParams, TicketStore};
pub use telemetry::{init_json_tracing, init_tracing};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the store
    pub use crate::{FilterHooks, ListParams, RequestContext, StoreError, TicketStore};
}
