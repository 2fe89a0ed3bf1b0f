//! In-memory full-text index
//!
//! Summaries are kept per ticket id; every token of a summary maps to the
//! ids containing it. Re-indexing a ticket first removes its old postings,
//! so indexing the same summary twice leaves the index unchanged.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use triage_model::{TicketId, TicketSummary};
use triage_query::{QueryError, Searcher};

use crate::error::IndexError;
use crate::TicketIndex;

/// Top-level ticket fields a filter may reference
pub const SEARCHABLE_FIELDS: &[&str] = &[
    "id",
    "name",
    "owner",
    "status",
    "type",
    "details",
    "schema",
    "created",
    "modified",
    "artifacts",
    "comments",
    "references",
    "files",
    "playbooks",
];

/// Thread-safe in-memory ticket index
#[derive(Debug, Default)]
pub struct MemoryIndex {
    /// Indexed summaries by ticket id
    docs: DashMap<TicketId, TicketSummary>,

    /// Token -> ids of summaries containing it
    postings: RwLock<HashMap<String, BTreeSet<TicketId>>>,
}

impl MemoryIndex {
    /// Create empty index
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexed summary of a ticket
    #[must_use]
    pub fn get(&self, id: TicketId) -> Option<TicketSummary> {
        self.docs.get(&id).map(|entry| entry.value().clone())
    }

    /// Check if a ticket is indexed
    #[inline]
    #[must_use]
    pub fn contains(&self, id: TicketId) -> bool {
        self.docs.contains_key(&id)
    }

    /// Number of indexed tickets
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// Check if index is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Number of distinct tokens
    #[must_use]
    pub fn token_count(&self) -> usize {
        self.postings.read().len()
    }

    /// Postings stay write-locked across the doc swap
    fn insert(&self, summary: TicketSummary) {
        let id = summary.id;
        let tokens = summary_tokens(&summary);

        let mut postings = self.postings.write();
        if let Some(previous) = self.docs.insert(id, summary) {
            unpost(&mut postings, id, &summary_tokens(&previous));
        }
        for token in tokens {
            postings.entry(token).or_default().insert(id);
        }
    }

    fn remove(&self, id: TicketId) -> bool {
        let mut postings = self.postings.write();
        let Some((_, previous)) = self.docs.remove(&id) else {
            return false;
        };
        unpost(&mut postings, id, &summary_tokens(&previous));
        true
    }
}

fn unpost(postings: &mut HashMap<String, BTreeSet<TicketId>>, id: TicketId, tokens: &BTreeSet<String>) {
    for token in tokens {
        if let Some(ids) = postings.get_mut(token) {
            ids.remove(&id);
            if ids.is_empty() {
                postings.remove(token);
            }
        }
    }
}

/// Lowercased alphanumeric tokens of a text
#[must_use]
pub fn tokenize(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn summary_tokens(summary: &TicketSummary) -> BTreeSet<String> {
    let mut tokens = tokenize(&summary.name);
    tokens.extend(tokenize(&summary.ticket_type));
    tokens.extend(tokenize(&summary.status));
    if let Some(owner) = &summary.owner {
        tokens.extend(tokenize(owner));
    }
    for text in summary
        .artifacts
        .iter()
        .chain(&summary.comments)
        .chain(&summary.details)
    {
        tokens.extend(tokenize(text));
    }
    tokens
}

impl Searcher for MemoryIndex {
    fn fields(&self) -> Vec<String> {
        SEARCHABLE_FIELDS.iter().map(|f| (*f).to_string()).collect()
    }

    fn search(&self, term: &str) -> Result<Vec<i64>, QueryError> {
        let tokens = tokenize(term);
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let postings = self.postings.read();
        let mut hits: Option<BTreeSet<TicketId>> = None;
        for token in &tokens {
            let Some(ids) = postings.get(token) else {
                return Ok(Vec::new());
            };
            hits = Some(match hits {
                Some(acc) => acc.intersection(ids).copied().collect(),
                None => ids.clone(),
            });
        }

        Ok(hits.unwrap_or_default().into_iter().map(|id| id.0).collect())
    }
}

#[async_trait]
impl TicketIndex for MemoryIndex {
    async fn index(&self, summaries: Vec<TicketSummary>) -> Result<(), IndexError> {
        for summary in summaries {
            self.insert(summary);
        }
        Ok(())
    }

    async fn delete(&self, ids: &[TicketId]) -> Result<(), IndexError> {
        for id in ids {
            self.remove(*id);
        }
        Ok(())
    }

    async fn truncate(&self) -> Result<(), IndexError> {
        let mut postings = self.postings.write();
        self.docs.clear();
        postings.clear();
        Ok(())
    }
}
