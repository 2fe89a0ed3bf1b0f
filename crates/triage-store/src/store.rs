//! Ticket graph store
//!
//! Owns ticket documents and the relation graph. Every operation:
//!
//! 1. Checks the request context for cancellation between steps
//! 2. Composes the read or write filter from the injected hooks
//! 3. Applies the change to the backend atomically per document
//! 4. Appends an activity log entry and publishes a change event
//!
//! Index maintenance after a write is best effort: failures are logged and
//! never fail the operation.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use triage_bus::{ChangeBus, ChangeEvent, ChangeKind};
use triage_index::{batch_index, rebuild, TicketIndex};
use triage_model::{
    document_id, validate_document, validate_ticket, Artifact, Comment, CommentForm, File, Job, LogEntry,
    PlaybookTemplateForm, Reference, Ticket, TicketForm, TicketId, TicketList, TicketResponse,
    TicketSummary, TicketWithTickets,
};
use triage_query::{compare_values, Clause, Compiler, FilterClause, Operand, DEFAULT_PREFIX};
use triage_workflow::{chain_next, disambiguate, from_form, run_root_task, JobSink};

use crate::backend::MemoryBackend;
use crate::config::StoreConfig;
use crate::context::RequestContext;
use crate::error::StoreError;
use crate::hooks::{merge_document, FilterHooks};

/// Decode a stored document
pub(crate) fn decode(doc: Value) -> Result<TicketResponse, StoreError> {
    Ok(serde_json::from_value(doc)?)
}

/// Listing parameters
///
/// `desc` holds one flag per entry of `sort`; missing flags mean ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListParams {
    /// Only tickets of this type
    pub ticket_type: Option<String>,
    /// User filter query
    pub query: Option<String>,
    /// Sort fields, dotted paths
    pub sort: Vec<String>,
    /// Descending flags per sort field
    pub desc: Vec<bool>,
    /// Items to skip
    pub offset: usize,
    /// Page size, everything when `None`
    pub count: Option<usize>,
}

impl ListParams {
    /// List everything
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Only tickets of `ticket_type`
    #[must_use]
    pub fn with_type(mut self, ticket_type: impl Into<String>) -> Self {
        self.ticket_type = Some(ticket_type.into());
        self
    }

    /// With user filter query
    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Append a sort field
    #[must_use]
    pub fn with_sort(mut self, field: impl Into<String>, desc: bool) -> Self {
        self.sort.push(field.into());
        self.desc.push(desc);
        self
    }

    /// Page window
    #[inline]
    #[must_use]
    pub fn with_page(mut self, offset: usize, count: usize) -> Self {
        self.offset = offset;
        self.count = Some(count);
        self
    }
}

/// Ticket store
///
/// Cheap to clone; clones share the backend, index, hooks, job sink and bus.
#[derive(Clone)]
pub struct TicketStore {
    backend: Arc<MemoryBackend>,
    index: Arc<dyn TicketIndex>,
    hooks: Arc<dyn FilterHooks>,
    jobs: Arc<dyn JobSink>,
    bus: ChangeBus,
    config: StoreConfig,
}

impl std::fmt::Debug for TicketStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketStore")
            .field("tickets", &self.backend.len())
            .field("subscribers", &self.bus.subscriber_count())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TicketStore {
    /// Create store with default configuration
    #[must_use]
    pub fn new(index: Arc<dyn TicketIndex>, hooks: Arc<dyn FilterHooks>, jobs: Arc<dyn JobSink>) -> Self {
        let config = StoreConfig::default();
        Self {
            backend: Arc::new(MemoryBackend::new()),
            index,
            hooks,
            jobs,
            bus: ChangeBus::new(config.bus_capacity),
            config,
        }
    }

    /// Replace configuration; recreates the change bus with the new capacity
    #[must_use]
    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.bus = ChangeBus::new(config.bus_capacity);
        self.config = config;
        self
    }

    /// Change bus of this store
    #[inline]
    #[must_use]
    pub fn bus(&self) -> &ChangeBus {
        &self.bus
    }

    /// Search index of this store
    #[inline]
    #[must_use]
    pub fn index(&self) -> &Arc<dyn TicketIndex> {
        &self.index
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Keep the index in step with the change bus until `shutdown` fires
    #[must_use]
    pub fn spawn_index_sync(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        crate::sync::spawn_index_sync(
            &self.bus,
            Arc::clone(&self.backend),
            Arc::clone(&self.index),
            shutdown,
        )
    }

    /// Create tickets in one all-or-nothing batch
    ///
    /// # Errors
    /// - `Validation` aggregating the schema violations of every document
    /// - `Cycle` when an attached playbook is not acyclic
    /// - `AccessDenied` when a document fails the write filter
    /// - `Conflict` when an explicit id already exists
    /// - the first job dispatch failure of a playbook root task
    pub async fn create(&self, ctx: &RequestContext, forms: Vec<TicketForm>) -> Result<Vec<TicketResponse>, StoreError> {
        ctx.check()?;
        let write = self.hooks.ticket_write_filter(ctx)?;
        let ingestion = self.hooks.ingestion_filter(ctx)?;

        let now = Utc::now();
        let mut drafts = Vec::with_capacity(forms.len());
        let mut violations = Vec::new();
        for (position, form) in forms.into_iter().enumerate() {
            let (id, ticket) = self.ticket_from_form(form, now)?;
            if let Err(err) = validate_ticket(&ticket) {
                if err.violations().is_empty() {
                    return Err(err.into());
                }
                violations.extend(err.violations().iter().map(|v| format!("ticket {position}: {v}")));
            }
            drafts.push((id, ticket));
        }
        if !violations.is_empty() {
            return Err(StoreError::Validation(violations));
        }

        let mut docs = Vec::with_capacity(drafts.len());
        for (position, (id, ticket)) in drafts.into_iter().enumerate() {
            let mut doc = serde_json::to_value(&ticket)?;
            if let (Some(id), Value::Object(map)) = (id, &mut doc) {
                map.insert("id".to_string(), Value::from(id.0));
            }
            if !write.matches(&doc)? {
                return Err(StoreError::AccessDenied(format!("may not create ticket {:?}", ticket.name)));
            }
            for patch in &ingestion {
                merge_document(&mut doc, patch);
            }
            if let Err(err) = validate_document(&doc) {
                violations.extend(err.violations().iter().map(|v| format!("ticket {position}: {v}")));
            }
            docs.push((id, doc));
        }
        if !violations.is_empty() {
            return Err(StoreError::Validation(violations));
        }

        ctx.check()?;
        let ids = self.backend.insert_many(docs)?;

        let mut created = Vec::with_capacity(ids.len());
        for id in &ids {
            let doc = self
                .backend
                .get(*id)
                .ok_or_else(|| StoreError::Backend(format!("{} vanished after insert", document_id(*id))))?;
            created.push(decode(doc)?);
            self.log(ctx, *id, "Created ticket");
        }

        let summaries: Vec<TicketSummary> = created.iter().map(TicketSummary::from).collect();
        if let Err(err) = batch_index(&self.index, summaries, self.config.index_batch_size).await {
            tracing::warn!(error = %err, "indexing created tickets failed");
        }
        self.publish(ids.iter().copied(), ChangeKind::Created);

        for ticket in &created {
            for (playbook_id, playbook) in &ticket.ticket.playbooks {
                run_root_task(self.jobs.as_ref(), ticket.id, playbook_id, playbook).await?;
            }
        }

        tracing::info!(count = created.len(), "created tickets");
        Ok(created)
    }

    /// Ticket with related tickets and activity log
    ///
    /// Also re-indexes the ticket in the background.
    ///
    /// # Errors
    /// `NotFound` when the ticket is missing or hidden by the read filter
    pub async fn get(&self, ctx: &RequestContext, id: TicketId) -> Result<TicketWithTickets, StoreError> {
        let read = self.hooks.ticket_read_filter(ctx)?;
        let ticket = self.load(ctx, id, &read)?;

        let index = Arc::clone(&self.index);
        let summary = TicketSummary::from(&ticket);
        tokio::spawn(async move {
            if let Err(err) = index.index(vec![summary]).await {
                tracing::warn!(ticket = %id, error = %err, "background re-index failed");
            }
        });

        let mut related: BTreeSet<TicketId> = self.backend.outbound(id).into_iter().collect();
        related.extend(self.backend.inbound(id));
        related.extend(self.backend.sharing_artifacts(ticket.ticket.artifact_names()));
        related.remove(&id);

        let mut tickets = Vec::with_capacity(related.len());
        for other in related {
            ctx.check()?;
            let Some(doc) = self.backend.get(other) else {
                continue;
            };
            if read.matches(&doc)? {
                tickets.push(decode(doc)?);
            }
        }

        let logs = self.backend.logs(&document_id(id));
        Ok(TicketWithTickets { ticket, tickets, logs })
    }

    /// Replace a ticket; `modified` is always set by the server
    ///
    /// # Errors
    /// `NotFound` under the write filter, `Validation` for an invalid
    /// replacement
    pub async fn update(&self, ctx: &RequestContext, id: TicketId, ticket: Ticket) -> Result<TicketWithTickets, StoreError> {
        self.modify(ctx, id, "Updated ticket", move |current| {
            let modified = current.modified;
            *current = ticket;
            current.modified = modified;
            Ok(())
        })?;
        self.get(ctx, id).await
    }

    /// Delete a ticket with its relation edges and artifact index entries
    ///
    /// # Errors
    /// `NotFound` when the ticket is missing or hidden by the read filter
    pub async fn delete(&self, ctx: &RequestContext, id: TicketId) -> Result<(), StoreError> {
        let read = self.hooks.ticket_read_filter(ctx)?;
        self.load(ctx, id, &read)?;

        ctx.check()?;
        if self.backend.remove(id).is_none() {
            return Err(StoreError::NotFound(document_id(id)));
        }
        if let Err(err) = self.index.delete(&[id]).await {
            tracing::warn!(ticket = %id, error = %err, "removing ticket from index failed");
        }
        self.publish([id], ChangeKind::Deleted);

        tracing::info!(ticket = %id, "deleted ticket");
        Ok(())
    }

    /// One page of tickets plus the size of the whole filtered set
    ///
    /// Sorted by the requested fields, then by id ascending.
    ///
    /// # Errors
    /// `Syntax` or `InvalidFilter` for a bad query, `Canceled` or
    /// `DeadlineExceeded` while scanning
    pub async fn list(&self, ctx: &RequestContext, params: &ListParams) -> Result<TicketList, StoreError> {
        let compiled = match params.query.as_deref() {
            Some(query) => Compiler::new(self.index.as_ref(), DEFAULT_PREFIX).compile(query)?,
            None => FilterClause::all(),
        };
        let filter = self.listing_filter(ctx, params.ticket_type.as_deref(), compiled)?;

        let count = self.count_matching(ctx, &filter)?;

        let mut docs = self.scan(ctx, &filter)?;
        if !params.sort.is_empty() {
            docs.sort_by(|a, b| compare_by(a, b, &params.sort, &params.desc));
        }

        let page = docs.into_iter().skip(params.offset);
        let page: Vec<Value> = match params.count {
            Some(n) => page.take(n).collect(),
            None => page.collect(),
        };
        let tickets = page.into_iter().map(decode).collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(count, returned = tickets.len(), "listed tickets");
        Ok(TicketList { count, tickets })
    }

    /// Number of readable tickets matching a type and a compiled filter
    ///
    /// # Errors
    /// `InvalidFilter` for unbound parameters, `Canceled` or
    /// `DeadlineExceeded` while scanning
    pub async fn count(
        &self,
        ctx: &RequestContext,
        ticket_type: Option<&str>,
        filter: &FilterClause,
    ) -> Result<usize, StoreError> {
        let filter = self.listing_filter(ctx, ticket_type, filter.clone())?;
        self.count_matching(ctx, &filter)
    }

    /// Append an artifact; type and status are defaulted
    ///
    /// # Errors
    /// `NotFound` under the write filter
    pub async fn add_artifact(&self, ctx: &RequestContext, id: TicketId, artifact: Artifact) -> Result<TicketWithTickets, StoreError> {
        let artifact = artifact.with_defaults();
        let message = format!("Added artifact {}", artifact.name);
        self.modify(ctx, id, &message, |ticket| {
            ticket.artifacts.push(artifact);
            Ok(())
        })?;
        self.get(ctx, id).await
    }

    /// Remove the first artifact named `name`
    ///
    /// # Errors
    /// `NotFound` under the write filter
    pub async fn remove_artifact(&self, ctx: &RequestContext, id: TicketId, name: &str) -> Result<TicketWithTickets, StoreError> {
        self.modify(ctx, id, &format!("Removed artifact {name}"), |ticket| {
            if let Some(position) = ticket.artifacts.iter().position(|a| a.name == name) {
                ticket.artifacts.remove(position);
            }
            Ok(())
        })?;
        self.get(ctx, id).await
    }

    /// Replace the details schema
    ///
    /// # Errors
    /// `NotFound` under the write filter
    pub async fn set_template(&self, ctx: &RequestContext, id: TicketId, schema: String) -> Result<TicketWithTickets, StoreError> {
        self.modify(ctx, id, "Set template", |ticket| {
            ticket.schema = schema;
            Ok(())
        })?;
        self.get(ctx, id).await
    }

    /// Append a comment
    ///
    /// # Errors
    /// - `AccessDenied` without a creator on the form or a user on the context
    /// - `NotFound` under the write filter
    pub async fn add_comment(&self, ctx: &RequestContext, id: TicketId, form: CommentForm) -> Result<TicketWithTickets, StoreError> {
        let creator = form
            .creator
            .clone()
            .or_else(|| ctx.user().map(str::to_string))
            .ok_or_else(|| StoreError::AccessDenied("comment without creator".into()))?;
        let comment: Comment = form.into_comment(creator, Utc::now());

        self.modify(ctx, id, "Added comment", |ticket| {
            ticket.comments.push(comment);
            Ok(())
        })?;
        self.get(ctx, id).await
    }

    /// Remove the comment at `position`; out of range leaves comments as they are
    ///
    /// # Errors
    /// `NotFound` under the write filter
    pub async fn remove_comment(&self, ctx: &RequestContext, id: TicketId, position: usize) -> Result<TicketWithTickets, StoreError> {
        self.modify(ctx, id, &format!("Removed comment {position}"), |ticket| {
            if position < ticket.comments.len() {
                ticket.comments.remove(position);
            }
            Ok(())
        })?;
        self.get(ctx, id).await
    }

    /// Replace all references
    ///
    /// # Errors
    /// `NotFound` under the write filter
    pub async fn set_references(&self, ctx: &RequestContext, id: TicketId, references: Vec<Reference>) -> Result<TicketWithTickets, StoreError> {
        self.modify(ctx, id, "Changed references", |ticket| {
            ticket.references = references;
            Ok(())
        })?;
        self.get(ctx, id).await
    }

    /// Append file metadata
    ///
    /// # Errors
    /// `NotFound` under the write filter
    pub async fn add_file(&self, ctx: &RequestContext, id: TicketId, file: File) -> Result<TicketWithTickets, StoreError> {
        let message = format!("Added file {}", file.name);
        self.modify(ctx, id, &message, |ticket| {
            ticket.files.push(file);
            Ok(())
        })?;
        self.get(ctx, id).await
    }

    /// Attach a playbook and run its root task
    ///
    /// The playbook id is disambiguated against the ids already attached.
    ///
    /// # Errors
    /// - `Cycle` or `Validation` for a bad template
    /// - `NotFound` under the write filter
    /// - the first job dispatch failure
    pub async fn attach_playbook(
        &self,
        ctx: &RequestContext,
        id: TicketId,
        form: &PlaybookTemplateForm,
    ) -> Result<TicketWithTickets, StoreError> {
        let (requested, playbook) = from_form(form)?;

        let (stored, playbook_id) = self.modify(ctx, id, &format!("Added playbook {requested}"), |ticket| {
            let playbook_id = disambiguate(&ticket.playbooks, &requested);
            ticket.playbooks.insert(playbook_id.clone(), playbook);
            Ok(playbook_id)
        })?;

        if let Some(playbook) = stored.ticket.playbooks.get(&playbook_id) {
            run_root_task(self.jobs.as_ref(), id, &playbook_id, playbook).await?;
        }
        self.get(ctx, id).await
    }

    /// Detach a playbook; an unknown id changes nothing but `modified`
    ///
    /// # Errors
    /// `NotFound` under the write filter
    pub async fn detach_playbook(&self, ctx: &RequestContext, id: TicketId, playbook_id: &str) -> Result<TicketWithTickets, StoreError> {
        self.modify(ctx, id, &format!("Removed playbook {playbook_id}"), |ticket| {
            ticket.playbooks.shift_remove(playbook_id);
            Ok(())
        })?;
        self.get(ctx, id).await
    }

    /// Mark a task done and dispatch jobs for what follows it
    ///
    /// # Errors
    /// - `NotFound` for an unknown ticket, playbook or task
    /// - the first job dispatch failure
    pub async fn complete_task(
        &self,
        ctx: &RequestContext,
        id: TicketId,
        playbook_id: &str,
        task_id: &str,
        output: Option<Value>,
    ) -> Result<Vec<Job>, StoreError> {
        let (stored, ()) = self.modify(ctx, id, &format!("Completed task {playbook_id}/{task_id}"), |ticket| {
            let task = ticket
                .playbooks
                .get_mut(playbook_id)
                .and_then(|playbook| playbook.tasks.get_mut(task_id))
                .ok_or_else(|| StoreError::NotFound(format!("{}/playbooks/{playbook_id}/{task_id}", document_id(id))))?;
            task.done = true;
            task.output = output;
            Ok(())
        })?;

        let playbook = stored
            .ticket
            .playbooks
            .get(playbook_id)
            .ok_or_else(|| StoreError::NotFound(format!("{}/playbooks/{playbook_id}", document_id(id))))?;
        Ok(chain_next(self.jobs.as_ref(), id, playbook_id, playbook, task_id).await?)
    }

    /// Add a relation edge `from -> to`
    ///
    /// # Errors
    /// `NotFound` when `from` fails the write filter or `to` the read filter
    pub async fn link_tickets(&self, ctx: &RequestContext, from: TicketId, to: TicketId) -> Result<TicketWithTickets, StoreError> {
        self.edit_edge(ctx, from, to, true)?;
        self.get(ctx, from).await
    }

    /// Remove the relation edge `from -> to`
    ///
    /// # Errors
    /// `NotFound` when `from` fails the write filter or `to` the read filter
    pub async fn unlink_tickets(&self, ctx: &RequestContext, from: TicketId, to: TicketId) -> Result<TicketWithTickets, StoreError> {
        self.edit_edge(ctx, from, to, false)?;
        self.get(ctx, from).await
    }

    /// Truncate the index and re-index every stored ticket
    ///
    /// # Errors
    /// Index failures, `Canceled` or `DeadlineExceeded` while scanning
    pub async fn rebuild_index(&self, ctx: &RequestContext) -> Result<(), StoreError> {
        let summaries = self
            .scan(ctx, &FilterClause::all())?
            .into_iter()
            .map(|doc| decode(doc).map(|ticket| TicketSummary::from(&ticket)))
            .collect::<Result<Vec<_>, _>>()?;
        rebuild(&self.index, summaries, self.config.index_batch_size).await?;
        Ok(())
    }

    fn ticket_from_form(&self, form: TicketForm, now: DateTime<Utc>) -> Result<(Option<TicketId>, Ticket), StoreError> {
        let mut playbooks = IndexMap::with_capacity(form.playbooks.len());
        for template in &form.playbooks {
            let (requested, playbook) = from_form(template)?;
            let playbook_id = disambiguate(&playbooks, &requested);
            playbooks.insert(playbook_id, playbook);
        }

        let created = form.created.unwrap_or(now);
        let status = if form.status.is_empty() {
            self.config.default_status.clone()
        } else {
            form.status
        };

        let ticket = Ticket {
            name: form.name,
            owner: form.owner,
            status,
            ticket_type: form.ticket_type,
            details: form.details,
            schema: form.schema.unwrap_or_else(|| "{}".to_string()),
            created,
            modified: form.modified.unwrap_or(now).max(created),
            artifacts: form.artifacts.into_iter().map(Artifact::with_defaults).collect(),
            comments: form.comments,
            references: form.references,
            files: form.files,
            playbooks,
            read: form.read,
            write: form.write,
        };
        Ok((form.id.map(TicketId), ticket))
    }

    fn load(&self, ctx: &RequestContext, id: TicketId, filter: &FilterClause) -> Result<TicketResponse, StoreError> {
        decode(self.load_document(ctx, id, filter)?)
    }

    fn load_document(&self, ctx: &RequestContext, id: TicketId, filter: &FilterClause) -> Result<Value, StoreError> {
        ctx.check()?;
        let doc = self
            .backend
            .get(id)
            .ok_or_else(|| StoreError::NotFound(document_id(id)))?;
        if !filter.matches(&doc)? {
            tracing::debug!(ticket = %id, %filter, "ticket hidden by filter");
            return Err(StoreError::NotFound(document_id(id)));
        }
        Ok(doc)
    }

    /// Read under the write filter, apply `change`, stamp, validate and persist
    ///
    /// Only the fields of [`Ticket`] are rewritten; other keys of the stored
    /// document, such as those stamped by the ingestion filter, are kept.
    fn modify<T, F>(&self, ctx: &RequestContext, id: TicketId, message: &str, change: F) -> Result<(TicketResponse, T), StoreError>
    where
        F: FnOnce(&mut Ticket) -> Result<T, StoreError>,
    {
        let write = self.hooks.ticket_write_filter(ctx)?;
        let mut doc = self.load_document(ctx, id, &write)?;
        let mut stored = decode(doc.clone())?;
        let before = stored.to_document()?;

        let previous = stored.ticket.modified;
        let outcome = change(&mut stored.ticket)?;
        stored.ticket.modified = Utc::now().max(previous).max(stored.ticket.created);

        overlay(&mut doc, &before, stored.to_document()?);
        validate_document(&doc)?;
        ctx.check()?;
        self.backend.replace(id, doc)?;

        self.log(ctx, id, message);
        self.publish([id], ChangeKind::Updated);
        tracing::info!(ticket = %id, message, "modified ticket");
        Ok((stored, outcome))
    }

    fn edit_edge(&self, ctx: &RequestContext, from: TicketId, to: TicketId, link: bool) -> Result<(), StoreError> {
        let write = self.hooks.ticket_write_filter(ctx)?;
        let read = self.hooks.ticket_read_filter(ctx)?;
        self.load(ctx, from, &write)?;
        self.load(ctx, to, &read)?;

        let changed = if link {
            self.backend.link(from, to)
        } else {
            self.backend.unlink(from, to)
        };
        if changed {
            let verb = if link { "Linked" } else { "Unlinked" };
            self.log(ctx, from, &format!("{verb} {}", document_id(to)));
            self.publish([from], ChangeKind::Updated);
        }
        Ok(())
    }

    fn listing_filter(&self, ctx: &RequestContext, ticket_type: Option<&str>, compiled: FilterClause) -> Result<FilterClause, StoreError> {
        let mut filter = self.hooks.ticket_read_filter(ctx)?;
        if let Some(ticket_type) = ticket_type {
            filter = filter.and(FilterClause::from_clause(Clause::eq(
                Operand::field(DEFAULT_PREFIX, "type"),
                Operand::literal(ticket_type),
            )));
        }
        Ok(filter.and(compiled))
    }

    fn scan(&self, ctx: &RequestContext, filter: &FilterClause) -> Result<Vec<Value>, StoreError> {
        let mut cursor = self.backend.cursor(ctx);
        let mut docs = Vec::new();
        while let Some((_, doc)) = cursor.read_next()? {
            if filter.matches(&doc)? {
                docs.push(doc);
            }
        }
        Ok(docs)
    }

    fn count_matching(&self, ctx: &RequestContext, filter: &FilterClause) -> Result<usize, StoreError> {
        let mut cursor = self.backend.cursor(ctx);
        let mut count = 0;
        while let Some((_, doc)) = cursor.read_next()? {
            if filter.matches(&doc)? {
                count += 1;
            }
        }
        Ok(count)
    }

    fn log(&self, ctx: &RequestContext, id: TicketId, message: &str) {
        if !self.config.activity_log {
            return;
        }
        self.backend.append_log(LogEntry {
            reference: document_id(id),
            creator: ctx.actor().to_string(),
            created: Utc::now(),
            message: message.to_string(),
        });
    }

    fn publish(&self, ids: impl IntoIterator<Item = TicketId>, kind: ChangeKind) {
        let ids: Vec<String> = ids.into_iter().map(document_id).collect();
        let receivers = self.bus.publish(ChangeEvent::new(ids, kind));
        tracing::debug!(?kind, receivers, "published change");
    }
}

/// Replace the keys `before` declared with those of `after`, keeping the rest of `target`
fn overlay(target: &mut Value, before: &Value, after: Value) {
    match (target, before, after) {
        (Value::Object(target), Value::Object(before), Value::Object(after)) => {
            for key in before.keys() {
                if !after.contains_key(key) {
                    target.remove(key);
                }
            }
            target.extend(after);
        }
        (target, _, after) => *target = after,
    }
}

fn compare_by(a: &Value, b: &Value, fields: &[String], desc: &[bool]) -> Ordering {
    for (i, field) in fields.iter().enumerate() {
        let pointer = format!("/{}", field.replace('.', "/"));
        let left = a.pointer(&pointer).unwrap_or(&Value::Null);
        let right = b.pointer(&pointer).unwrap_or(&Value::Null);
        let ordering = compare_values(left, right);
        let ordering = if desc.get(i).copied().unwrap_or(false) {
            ordering.reverse()
        } else {
            ordering
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}
