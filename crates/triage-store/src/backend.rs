//! In-memory graph-document backend
//!
//! Ticket documents live in one collection keyed by numeric id. Explicit
//! relations are a table of `(from, to)` edges kept in two ordered sets so
//! both outbound and inbound neighbours are range lookups. The implicit
//! artifact relation is an inverted index from artifact name to ticket ids.
//! Every collection sits behind its own `RwLock`; each operation holds the
//! locks it needs for its whole duration, which makes single-document writes
//! and batch inserts atomic.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};

use parking_lot::RwLock;
use serde_json::Value;
use triage_model::{document_id, LogEntry, TicketId};

use crate::context::RequestContext;
use crate::error::StoreError;

/// Document store used by [`crate::TicketStore`]
#[derive(Debug)]
pub struct MemoryBackend {
    tickets: RwLock<BTreeMap<TicketId, Value>>,
    outbound: RwLock<BTreeSet<(TicketId, TicketId)>>,
    inbound: RwLock<BTreeSet<(TicketId, TicketId)>>,
    artifacts: RwLock<HashMap<String, BTreeSet<TicketId>>>,
    logs: RwLock<HashMap<String, Vec<LogEntry>>>,
    sequence: AtomicI64,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self {
            tickets: RwLock::new(BTreeMap::new()),
            outbound: RwLock::new(BTreeSet::new()),
            inbound: RwLock::new(BTreeSet::new()),
            artifacts: RwLock::new(HashMap::new()),
            logs: RwLock::new(HashMap::new()),
            sequence: AtomicI64::new(1),
        }
    }
}

fn artifact_names(doc: &Value) -> BTreeSet<String> {
    doc.get("artifacts")
        .and_then(Value::as_array)
        .map(|artifacts| {
            artifacts
                .iter()
                .filter_map(|a| a.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn edge_range(id: TicketId) -> std::ops::RangeInclusive<(TicketId, TicketId)> {
    (id, TicketId(i64::MIN))..=(id, TicketId(i64::MAX))
}

impl MemoryBackend {
    /// Create empty backend
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert documents all-or-nothing
    ///
    /// Documents with an explicit id keep it; the others get the next value
    /// of the id sequence. The `id` field of every document is set to its
    /// final id.
    ///
    /// # Errors
    /// - `StoreError::Conflict` when an explicit id exists or repeats
    /// - `StoreError::Validation` for an explicit id the sequence cannot pass
    ///
    /// Nothing is inserted on error.
    pub fn insert_many(&self, docs: Vec<(Option<TicketId>, Value)>) -> Result<Vec<TicketId>, StoreError> {
        let mut tickets = self.tickets.write();

        let mut explicit = BTreeSet::new();
        for id in docs.iter().filter_map(|(id, _)| *id) {
            if tickets.contains_key(&id) || !explicit.insert(id) {
                return Err(StoreError::Conflict(format!("{} already exists", document_id(id))));
            }
        }
        let mut next = self.sequence.load(Ordering::SeqCst);
        if let Some(max) = explicit.last() {
            let after = max.0.checked_add(1).ok_or_else(|| {
                StoreError::Validation(vec![format!("{} is out of range", document_id(*max))])
            })?;
            next = next.max(after);
        }

        let mut assigned = Vec::with_capacity(docs.len());
        for (id, _) in &docs {
            let id = match id {
                Some(id) => *id,
                None => loop {
                    let candidate = TicketId(next);
                    next = next
                        .checked_add(1)
                        .ok_or_else(|| StoreError::Backend("ticket id sequence exhausted".into()))?;
                    if !tickets.contains_key(&candidate) {
                        break candidate;
                    }
                },
            };
            assigned.push(id);
        }
        self.sequence.store(next, Ordering::SeqCst);

        let mut artifacts = self.artifacts.write();
        let mut ids = Vec::with_capacity(docs.len());
        for (id, (_, mut doc)) in assigned.into_iter().zip(docs) {
            if let Value::Object(map) = &mut doc {
                map.insert("id".to_string(), Value::from(id.0));
            }
            for name in artifact_names(&doc) {
                artifacts.entry(name).or_default().insert(id);
            }
            tickets.insert(id, doc);
            ids.push(id);
        }

        Ok(ids)
    }

    /// Document by id
    #[must_use]
    pub fn get(&self, id: TicketId) -> Option<Value> {
        self.tickets.read().get(&id).cloned()
    }

    /// Check if a document exists
    #[inline]
    #[must_use]
    pub fn contains(&self, id: TicketId) -> bool {
        self.tickets.read().contains_key(&id)
    }

    /// Number of documents
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.tickets.read().len()
    }

    /// Check if the collection is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replace a document, keeping the artifact index in step
    ///
    /// # Errors
    /// `StoreError::NotFound` when the document does not exist
    pub fn replace(&self, id: TicketId, mut doc: Value) -> Result<(), StoreError> {
        let mut tickets = self.tickets.write();
        let Some(slot) = tickets.get_mut(&id) else {
            return Err(StoreError::NotFound(document_id(id)));
        };
        if let Value::Object(map) = &mut doc {
            map.insert("id".to_string(), Value::from(id.0));
        }

        let before = artifact_names(slot);
        let after = artifact_names(&doc);
        *slot = doc;

        let mut artifacts = self.artifacts.write();
        for name in before.difference(&after) {
            if let Some(ids) = artifacts.get_mut(name) {
                ids.remove(&id);
                if ids.is_empty() {
                    artifacts.remove(name);
                }
            }
        }
        for name in after.difference(&before) {
            artifacts.entry(name.clone()).or_default().insert(id);
        }
        Ok(())
    }

    /// Remove a document with its edges, artifact entries and log
    pub fn remove(&self, id: TicketId) -> Option<Value> {
        let doc = self.tickets.write().remove(&id)?;

        let targets: Vec<TicketId> = self.outbound(id);
        let sources: Vec<TicketId> = self.inbound(id);
        {
            let mut outbound = self.outbound.write();
            let mut inbound = self.inbound.write();
            for to in targets {
                outbound.remove(&(id, to));
                inbound.remove(&(to, id));
            }
            for from in sources {
                outbound.remove(&(from, id));
                inbound.remove(&(id, from));
            }
        }

        let mut artifacts = self.artifacts.write();
        for name in artifact_names(&doc) {
            if let Some(ids) = artifacts.get_mut(&name) {
                ids.remove(&id);
                if ids.is_empty() {
                    artifacts.remove(&name);
                }
            }
        }
        drop(artifacts);

        self.logs.write().remove(&document_id(id));
        Some(doc)
    }

    /// Add a relation edge; returns whether it was new
    pub fn link(&self, from: TicketId, to: TicketId) -> bool {
        let mut outbound = self.outbound.write();
        let mut inbound = self.inbound.write();
        inbound.insert((to, from));
        outbound.insert((from, to))
    }

    /// Remove a relation edge; returns whether it existed
    pub fn unlink(&self, from: TicketId, to: TicketId) -> bool {
        let mut outbound = self.outbound.write();
        let mut inbound = self.inbound.write();
        inbound.remove(&(to, from));
        outbound.remove(&(from, to))
    }

    /// Targets of edges starting at `id`
    #[must_use]
    pub fn outbound(&self, id: TicketId) -> Vec<TicketId> {
        self.outbound
            .read()
            .range(edge_range(id))
            .map(|(_, to)| *to)
            .collect()
    }

    /// Sources of edges ending at `id`
    #[must_use]
    pub fn inbound(&self, id: TicketId) -> Vec<TicketId> {
        self.inbound
            .read()
            .range(edge_range(id))
            .map(|(_, from)| *from)
            .collect()
    }

    /// Tickets carrying any of the given artifact names
    #[must_use]
    pub fn sharing_artifacts<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> BTreeSet<TicketId> {
        let artifacts = self.artifacts.read();
        names
            .into_iter()
            .filter_map(|name| artifacts.get(name))
            .flatten()
            .copied()
            .collect()
    }

    /// Append an activity log entry
    pub fn append_log(&self, entry: LogEntry) {
        self.logs
            .write()
            .entry(entry.reference.clone())
            .or_default()
            .push(entry);
    }

    /// Activity log of a document, oldest first
    #[must_use]
    pub fn logs(&self, reference: &str) -> Vec<LogEntry> {
        self.logs.read().get(reference).cloned().unwrap_or_default()
    }

    /// Cursor over a snapshot of all documents, ascending by id
    #[must_use]
    pub fn cursor<'c>(&self, ctx: &'c RequestContext) -> Cursor<'c> {
        let snapshot: Vec<(TicketId, Value)> = self
            .tickets
            .read()
            .iter()
            .map(|(id, doc)| (*id, doc.clone()))
            .collect();
        Cursor {
            ctx,
            items: snapshot.into_iter(),
            closed: false,
        }
    }
}

/// Cancellation-aware read cursor
///
/// Every read checks the request context first; a cancelled or expired
/// request closes the cursor and fails the read.
#[derive(Debug)]
pub struct Cursor<'c> {
    ctx: &'c RequestContext,
    items: std::vec::IntoIter<(TicketId, Value)>,
    closed: bool,
}

impl Cursor<'_> {
    /// Next document
    ///
    /// # Errors
    /// `StoreError::Canceled` or `StoreError::DeadlineExceeded`
    pub fn read_next(&mut self) -> Result<Option<(TicketId, Value)>, StoreError> {
        if self.closed {
            return Ok(None);
        }
        if let Err(err) = self.ctx.check() {
            self.close();
            return Err(err);
        }
        Ok(self.items.next())
    }

    /// Release the remaining snapshot
    pub fn close(&mut self) {
        self.closed = true;
        self.items = Vec::new().into_iter();
    }

    /// Whether the cursor was closed
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
