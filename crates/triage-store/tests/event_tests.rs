use pretty_assertions::assert_eq;
use tokio::sync::broadcast::{error::TryRecvError, Receiver};
use triage_bus::{ChangeEvent, ChangeKind};
use triage_model::{CommentForm, TicketId};
use triage_store::{RequestContext, StoreError};
use triage_test_utils::{alert, harness, playbook, PHISHING_YAML};

fn next_event(rx: &mut Receiver<ChangeEvent>) -> ChangeEvent {
    let event = rx.try_recv().unwrap();
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)), "more than one event");
    event
}

fn event(ids: &[TicketId], kind: ChangeKind) -> ChangeEvent {
    ChangeEvent::new(ids.iter().map(|id| id.document_id()).collect(), kind)
}

#[tokio::test]
async fn batch_create_publishes_one_event() {
    let h = harness();
    let ctx = RequestContext::for_user("bob");
    let mut rx = h.store.bus().subscribe();

    let ids: Vec<TicketId> = h
        .store
        .create(&ctx, vec![alert("a"), alert("b"), alert("c")])
        .await
        .unwrap()
        .iter()
        .map(|t| t.id)
        .collect();

    assert_eq!(next_event(&mut rx), event(&ids, ChangeKind::Created));
}

#[tokio::test]
async fn updates_publish_updated() {
    let h = harness();
    let ctx = RequestContext::for_user("bob");
    let created = h.store.create(&ctx, vec![alert("a"), alert("b")]).await.unwrap();
    let (a, b) = (created[0].id, created[1].id);
    let mut rx = h.store.bus().subscribe();

    let mut replacement = created[0].ticket.clone();
    replacement.status = "closed".into();
    h.store.update(&ctx, a, replacement).await.unwrap();
    assert_eq!(next_event(&mut rx), event(&[a], ChangeKind::Updated));

    h.store.add_comment(&ctx, a, CommentForm::new("hi")).await.unwrap();
    assert_eq!(next_event(&mut rx), event(&[a], ChangeKind::Updated));

    h.store
        .attach_playbook(&ctx, b, &playbook(PHISHING_YAML))
        .await
        .unwrap();
    assert_eq!(next_event(&mut rx), event(&[b], ChangeKind::Updated));

    h.store.link_tickets(&ctx, a, b).await.unwrap();
    assert_eq!(next_event(&mut rx), event(&[a], ChangeKind::Updated));
}

#[tokio::test]
async fn delete_publishes_deleted() {
    let h = harness();
    let ctx = RequestContext::for_user("bob");
    let id = h.store.create(&ctx, vec![alert("a")]).await.unwrap()[0].id;
    let mut rx = h.store.bus().subscribe();

    h.store.delete(&ctx, id).await.unwrap();
    assert_eq!(next_event(&mut rx), event(&[id], ChangeKind::Deleted));
}

#[tokio::test]
async fn failed_writes_publish_nothing() {
    let h = harness();
    let ctx = RequestContext::for_user("bob");
    let created = h.store.create(&ctx, vec![alert("a")]).await.unwrap();
    let mut rx = h.store.bus().subscribe();

    let mut replacement = created[0].ticket.clone();
    replacement.name = String::new();
    assert!(matches!(
        h.store.update(&ctx, created[0].id, replacement).await,
        Err(StoreError::Validation(_))
    ));
    assert!(matches!(
        h.store.delete(&ctx, TicketId(404)).await,
        Err(StoreError::NotFound(_))
    ));

    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
}
