use std::time::Duration;

use pretty_assertions::assert_eq;
use triage_model::{CommentForm, File, Reference, TicketId};
use triage_store::{RequestContext, StoreError};
use triage_test_utils::{alert, alert_with_artifacts, harness};

#[tokio::test]
async fn created_ticket_gets_defaults() {
    let h = harness();
    let ctx = RequestContext::for_user("bob");
    let created = h.store.create(&ctx, vec![alert("Phishing mail")]).await.unwrap();

    let view = h.store.get(&ctx, created[0].id).await.unwrap();
    let ticket = &view.ticket.ticket;
    assert_eq!(ticket.status, "open");
    assert_eq!(ticket.schema, "{}");
    assert!(ticket.modified >= ticket.created);
    assert_eq!(view.logs.len(), 1);
    assert_eq!(view.logs[0].message, "Created ticket");
}

#[tokio::test]
async fn artifacts_are_typed_on_insert() {
    let h = harness();
    let ctx = RequestContext::for_user("bob");
    let form = alert_with_artifacts(
        "Observables",
        &["1.2.3.4", "http://x.io", "a@b.com", "5d41402abc4b2a76b9719d911017c592", "whatever"],
    );
    let created = h.store.create(&ctx, vec![form]).await.unwrap();

    let kinds: Vec<Option<&str>> = created[0]
        .ticket
        .artifacts
        .iter()
        .map(|a| a.kind.as_deref())
        .collect();
    assert_eq!(kinds, vec![Some("ip"), Some("url"), Some("email"), Some("md5"), Some("unknown")]);
    assert!(created[0]
        .ticket
        .artifacts
        .iter()
        .all(|a| a.status.as_deref() == Some("unknown")));
}

#[tokio::test]
async fn explicit_ids_conflict_as_a_batch() {
    let h = harness();
    let ctx = RequestContext::for_user("bob");
    h.store.create(&ctx, vec![alert("first").with_id(7)]).await.unwrap();

    let err = h
        .store
        .create(&ctx, vec![alert("second"), alert("third").with_id(7)])
        .await
        .unwrap_err();
    assert_eq!(err, StoreError::Conflict("tickets/7 already exists".into()));

    let next = h.store.create(&ctx, vec![alert("fourth")]).await.unwrap();
    assert_eq!(next[0].id, TicketId(8));
}

#[tokio::test]
async fn largest_explicit_id_is_rejected() {
    let h = harness();
    let ctx = RequestContext::for_user("bob");

    let err = h
        .store
        .create(&ctx, vec![alert("x").with_id(i64::MAX)])
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));

    let next = h.store.create(&ctx, vec![alert("y")]).await.unwrap();
    assert_eq!(next[0].id, TicketId(1));
}

#[tokio::test]
async fn comments_are_removed_by_position() {
    let h = harness();
    let ctx = RequestContext::for_user("bob");
    let id = h.store.create(&ctx, vec![alert("x")]).await.unwrap()[0].id;

    for message in ["c0", "c1", "c2"] {
        h.store.add_comment(&ctx, id, CommentForm::new(message)).await.unwrap();
    }

    let messages = |view: &triage_model::TicketWithTickets| -> Vec<String> {
        view.ticket.ticket.comments.iter().map(|c| c.message.clone()).collect()
    };

    let view = h.store.remove_comment(&ctx, id, 1).await.unwrap();
    assert_eq!(messages(&view), vec!["c0", "c2"]);

    let view = h.store.remove_comment(&ctx, id, 1).await.unwrap();
    assert_eq!(messages(&view), vec!["c0"]);

    let view = h.store.remove_comment(&ctx, id, 5).await.unwrap();
    assert_eq!(messages(&view), vec!["c0"]);
    assert_eq!(view.ticket.ticket.comments[0].creator, "bob");
}

#[tokio::test]
async fn anonymous_comment_needs_a_creator() {
    let h = harness();
    let ctx = RequestContext::anonymous();
    let id = h.store.create(&ctx, vec![alert("x")]).await.unwrap()[0].id;

    let err = h.store.add_comment(&ctx, id, CommentForm::new("hi")).await.unwrap_err();
    assert!(matches!(err, StoreError::AccessDenied(_)));

    let view = h
        .store
        .add_comment(&ctx, id, CommentForm::new("hi").with_creator("sensor"))
        .await
        .unwrap();
    assert_eq!(view.ticket.ticket.comments[0].creator, "sensor");
}

#[tokio::test]
async fn field_operations_stamp_modified_and_log() {
    let h = harness();
    let ctx = RequestContext::for_user("bob");
    let created = h.store.create(&ctx, vec![alert("x")]).await.unwrap();
    let id = created[0].id;

    let view = h
        .store
        .add_artifact(&ctx, id, triage_model::Artifact::new("evil.com"))
        .await
        .unwrap();
    assert_eq!(view.ticket.ticket.artifacts[0].kind.as_deref(), Some("unknown"));

    h.store
        .set_references(
            &ctx,
            id,
            vec![Reference {
                href: "https://intel.example/1".into(),
                name: "intel".into(),
            }],
        )
        .await
        .unwrap();
    h.store
        .add_file(
            &ctx,
            id,
            File {
                key: "abc".into(),
                name: "mail.eml".into(),
            },
        )
        .await
        .unwrap();
    h.store
        .set_template(&ctx, id, r#"{"type":"object"}"#.to_string())
        .await
        .unwrap();
    let view = h.store.remove_artifact(&ctx, id, "evil.com").await.unwrap();

    let ticket = &view.ticket.ticket;
    assert!(ticket.artifacts.is_empty());
    assert_eq!(ticket.references.len(), 1);
    assert_eq!(ticket.files[0].name, "mail.eml");
    assert_eq!(ticket.schema, r#"{"type":"object"}"#);
    assert!(ticket.modified >= created[0].ticket.modified);

    let messages: Vec<&str> = view.logs.iter().map(|l| l.message.as_str()).collect();
    assert_eq!(
        messages,
        vec![
            "Created ticket",
            "Added artifact evil.com",
            "Changed references",
            "Added file mail.eml",
            "Set template",
            "Removed artifact evil.com",
        ]
    );
}

#[tokio::test]
async fn invalid_update_is_rejected() {
    let h = harness();
    let ctx = RequestContext::for_user("bob");
    let created = h.store.create(&ctx, vec![alert("x")]).await.unwrap();

    let mut replacement = created[0].ticket.clone();
    replacement.name = String::new();
    let err = h.store.update(&ctx, created[0].id, replacement).await.unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));

    let view = h.store.get(&ctx, created[0].id).await.unwrap();
    assert_eq!(view.ticket.ticket.name, "x");
}

#[tokio::test]
async fn delete_removes_ticket_and_edges() {
    let h = harness();
    let ctx = RequestContext::for_user("bob");
    let ids: Vec<TicketId> = h
        .store
        .create(&ctx, vec![alert("a"), alert("b")])
        .await
        .unwrap()
        .iter()
        .map(|t| t.id)
        .collect();
    h.store.link_tickets(&ctx, ids[0], ids[1]).await.unwrap();

    h.store.delete(&ctx, ids[1]).await.unwrap();

    assert!(matches!(h.store.get(&ctx, ids[1]).await, Err(StoreError::NotFound(_))));
    assert!(h.store.get(&ctx, ids[0]).await.unwrap().tickets.is_empty());
    assert!(!h.index.inner.contains(ids[1]));
    assert!(matches!(h.store.delete(&ctx, ids[1]).await, Err(StoreError::NotFound(_))));
}

#[tokio::test]
async fn missing_ticket_is_not_found() {
    let h = harness();
    let err = h
        .store
        .get(&RequestContext::anonymous(), TicketId(404))
        .await
        .unwrap_err();
    assert_eq!(err, StoreError::NotFound("tickets/404".into()));
}

#[tokio::test]
async fn expired_deadline_fails_reads() {
    let h = harness();
    let ctx = RequestContext::for_user("bob");
    let id = h.store.create(&ctx, vec![alert("x")]).await.unwrap()[0].id;

    let expired = RequestContext::for_user("bob").with_timeout(Duration::ZERO);
    assert_eq!(h.store.get(&expired, id).await.unwrap_err(), StoreError::DeadlineExceeded);
}
