//! Change-bus driven index synchronization

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use triage_bus::{ChangeBus, ChangeEvent, ChangeKind, RecvError};
use triage_index::TicketIndex;
use triage_model::{TicketId, TicketSummary, TICKET_COLLECTION};

use crate::backend::MemoryBackend;
use crate::store::decode;

/// Subscribe to `bus` and apply every change to `index` until `shutdown`
/// fires or the bus closes
///
/// The subscription is taken before this returns, so no event published
/// afterwards is missed. A lagging subscriber logs how many events it lost
/// and carries on; `rebuild_index` restores consistency.
pub(crate) fn spawn_index_sync(
    bus: &ChangeBus,
    backend: Arc<MemoryBackend>,
    index: Arc<dyn TicketIndex>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                received = rx.recv() => match received {
                    Ok(event) => apply(&backend, index.as_ref(), event).await,
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "index sync lagged behind the change bus");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
        tracing::debug!("index sync stopped");
    })
}

async fn apply(backend: &MemoryBackend, index: &dyn TicketIndex, event: ChangeEvent) {
    let ids: Vec<TicketId> = event.ids.iter().filter_map(|id| parse_document_id(id)).collect();

    let result = match event.kind {
        ChangeKind::Deleted => index.delete(&ids).await,
        ChangeKind::Created | ChangeKind::Updated => {
            let mut summaries = Vec::with_capacity(ids.len());
            let mut gone = Vec::new();
            for id in ids {
                match backend.get(id).map(decode) {
                    Some(Ok(ticket)) => summaries.push(TicketSummary::from(&ticket)),
                    Some(Err(err)) => tracing::error!(ticket = %id, error = %err, "undecodable ticket"),
                    None => gone.push(id),
                }
            }
            match index.index(summaries).await {
                Ok(()) if gone.is_empty() => Ok(()),
                Ok(()) => index.delete(&gone).await,
                Err(err) => Err(err),
            }
        }
    };

    if let Err(err) = result {
        tracing::warn!(kind = ?event.kind, error = %err, "index sync failed");
    }
}

fn parse_document_id(id: &str) -> Option<TicketId> {
    let key = id.strip_prefix(TICKET_COLLECTION)?.strip_prefix('/')?;
    TicketId::from_key(key).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_ids() {
        assert_eq!(parse_document_id("tickets/42"), Some(TicketId(42)));
        assert_eq!(parse_document_id("jobs/42"), None);
        assert_eq!(parse_document_id("tickets/x"), None);
    }
}
