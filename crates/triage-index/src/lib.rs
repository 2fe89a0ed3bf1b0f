//! Triage Index
//!
//! Full-text search index over ticket summaries and the batch
//! synchronization that keeps it in step with the document store.
//!
//! # Overview
//!
//! - [`TicketIndex`]: index backend contract (`index`, `delete`, `truncate`,
//!   plus `search`/`fields` through [`Searcher`])
//! - [`MemoryIndex`]: in-memory implementation
//! - [`batch_index`]: concurrent batched indexing
//! - [`rebuild`]: truncate and re-index everything
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use triage_index::{batch_index, MemoryIndex, TicketIndex};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let index: Arc<dyn TicketIndex> = Arc::new(MemoryIndex::new());
//! batch_index(&index, Vec::new(), 100).await.unwrap();
//! # }
//! ```

#![warn(missing_docs)]

use std::sync::Arc;

use async_trait::async_trait;
use triage_model::{TicketId, TicketSummary};

pub mod error;
pub mod memory;

pub use error::IndexError;
pub use memory::{tokenize, MemoryIndex, SEARCHABLE_FIELDS};
pub use triage_query::Searcher;

/// Default number of summaries per indexing batch
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Search index backend
///
/// `search` and `fields` come from [`Searcher`] so an index can be handed
/// straight to the filter compiler.
#[async_trait]
pub trait TicketIndex: Searcher {
    /// Add or replace summaries, keyed by ticket id
    async fn index(&self, summaries: Vec<TicketSummary>) -> Result<(), IndexError>;

    /// Remove tickets; unknown ids are ignored
    async fn delete(&self, ids: &[TicketId]) -> Result<(), IndexError>;

    /// Remove everything
    async fn truncate(&self) -> Result<(), IndexError>;
}

/// Index summaries in batches of `batch_size`, one task per batch
///
/// The final partial batch is flushed too. Batches run concurrently and no
/// order is guaranteed across or within them. Every batch runs to
/// completion; the first failure is returned afterwards.
///
/// # Errors
/// The first `IndexError` raised by any batch
pub async fn batch_index(
    index: &Arc<dyn TicketIndex>,
    summaries: Vec<TicketSummary>,
    batch_size: usize,
) -> Result<(), IndexError> {
    let batch_size = batch_size.max(1);
    let total = summaries.len();

    let mut handles = Vec::with_capacity(total.div_ceil(batch_size));
    let mut remaining = summaries.into_iter().peekable();
    while remaining.peek().is_some() {
        let batch: Vec<TicketSummary> = remaining.by_ref().take(batch_size).collect();
        let index = Arc::clone(index);
        handles.push(tokio::spawn(async move { index.index(batch).await }));
    }

    let batches = handles.len();
    let mut first_error = None;
    for outcome in futures::future::join_all(handles).await {
        let result = outcome
            .map_err(|e| IndexError::Task(e.to_string()))
            .and_then(|r| r);
        if let Err(err) = result {
            tracing::warn!(error = %err, "index batch failed");
            first_error.get_or_insert(err);
        }
    }

    tracing::debug!(total, batches, "batch indexing finished");
    first_error.map_or(Ok(()), Err)
}

/// Truncate the index and re-index every summary
///
/// Not transactional with concurrent writes: documents changed while the
/// rebuild runs may be indexed in either version.
///
/// # Errors
/// Truncation failure, or the first batch failure
pub async fn rebuild(
    index: &Arc<dyn TicketIndex>,
    summaries: Vec<TicketSummary>,
    batch_size: usize,
) -> Result<(), IndexError> {
    index.truncate().await?;
    let total = summaries.len();
    batch_index(index, summaries, batch_size).await?;
    tracing::info!(total, "index rebuilt");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use parking_lot::Mutex;
    use triage_query::QueryError;

    /// Counts batch sizes and optionally fails one of them
    #[derive(Default)]
    struct Counting {
        inner: MemoryIndex,
        batches: Mutex<Vec<usize>>,
        fail_containing: Option<TicketId>,
    }

    impl Searcher for Counting {
        fn fields(&self) -> Vec<String> {
            self.inner.fields()
        }

        fn search(&self, term: &str) -> Result<Vec<i64>, QueryError> {
            self.inner.search(term)
        }
    }

    #[async_trait]
    impl TicketIndex for Counting {
        async fn index(&self, summaries: Vec<TicketSummary>) -> Result<(), IndexError> {
            self.batches.lock().push(summaries.len());
            if let Some(bad) = self.fail_containing {
                if summaries.iter().any(|s| s.id == bad) {
                    return Err(IndexError::Backend(format!("rejected {bad}")));
                }
            }
            self.inner.index(summaries).await
        }

        async fn delete(&self, ids: &[TicketId]) -> Result<(), IndexError> {
            self.inner.delete(ids).await
        }

        async fn truncate(&self) -> Result<(), IndexError> {
            self.inner.truncate().await
        }
    }

    fn summaries(n: i64) -> Vec<TicketSummary> {
        let now = Utc::now();
        (1..=n)
            .map(|i| TicketSummary {
                id: TicketId(i),
                name: format!("ticket{i}"),
                ticket_type: "alert".into(),
                status: "open".into(),
                owner: None,
                created: now,
                modified: now,
                artifacts: Vec::new(),
                comments: Vec::new(),
                details: Vec::new(),
            })
            .collect()
    }

    #[tokio::test]
    async fn partial_batch_is_flushed() {
        let counting = Arc::new(Counting::default());
        let index: Arc<dyn TicketIndex> = counting.clone();

        batch_index(&index, summaries(250), 100).await.unwrap();

        let mut batches = counting.batches.lock().clone();
        batches.sort_unstable();
        assert_eq!(batches, vec![50, 100, 100]);
        assert_eq!(counting.inner.len(), 250);
        assert_eq!(index.search("ticket250").unwrap(), vec![250]);
    }

    #[tokio::test]
    async fn empty_input_spawns_nothing() {
        let counting = Arc::new(Counting::default());
        let index: Arc<dyn TicketIndex> = counting.clone();

        batch_index(&index, Vec::new(), 100).await.unwrap();
        assert!(counting.batches.lock().is_empty());
    }

    #[tokio::test]
    async fn failing_batch_does_not_stop_the_others() {
        let counting = Arc::new(Counting {
            fail_containing: Some(TicketId(150)),
            ..Counting::default()
        });
        let index: Arc<dyn TicketIndex> = counting.clone();

        let err = batch_index(&index, summaries(250), 100).await.unwrap_err();
        assert_eq!(err, IndexError::Backend("rejected 150".into()));
        assert_eq!(counting.batches.lock().len(), 3);
        assert_eq!(counting.inner.len(), 150);
    }

    #[tokio::test]
    async fn rebuild_replaces_contents() {
        let index: Arc<dyn TicketIndex> = Arc::new(MemoryIndex::new());
        batch_index(&index, summaries(5), 2).await.unwrap();

        rebuild(&index, summaries(2), 2).await.unwrap();
        assert_eq!(index.search("ticket2").unwrap(), vec![2]);
        assert!(index.search("ticket5").unwrap().is_empty());
    }
}
