use pretty_assertions::assert_eq;
use triage_model::TicketForm;
use triage_query::{Clause, FilterClause, Operand, DEFAULT_PREFIX};
use triage_store::{ListParams, RequestContext, StoreError};
use triage_test_utils::{alert, harness, Harness};

async fn seeded() -> (Harness, RequestContext) {
    let h = harness();
    let ctx = RequestContext::for_user("bob");
    h.store
        .create(
            &ctx,
            vec![
                alert("Phishing campaign").with_owner("amy"),
                alert("Malware beacon").with_status("closed").with_owner("bob"),
                TicketForm::new("Lost laptop", "incident"),
            ],
        )
        .await
        .unwrap();
    (h, ctx)
}

fn names(list: &triage_model::TicketList) -> Vec<&str> {
    list.tickets.iter().map(|t| t.ticket.name.as_str()).collect()
}

#[tokio::test]
async fn page_and_count_are_independent() {
    let (h, ctx) = seeded().await;
    let list = h
        .store
        .list(&ctx, &ListParams::new().with_type("alert").with_page(0, 1))
        .await
        .unwrap();

    assert_eq!(list.count, 2);
    assert_eq!(list.tickets.len(), 1);

    let rest = h
        .store
        .list(&ctx, &ListParams::new().with_type("alert").with_page(1, 10))
        .await
        .unwrap();
    assert_eq!(rest.count, 2);
    assert_eq!(names(&rest), vec!["Malware beacon"]);
}

#[tokio::test]
async fn status_filter_drops_closed_tickets() {
    let (h, ctx) = seeded().await;
    let list = h
        .store
        .list(&ctx, &ListParams::new().with_query(r#"status == "open""#))
        .await
        .unwrap();
    assert_eq!(names(&list), vec!["Phishing campaign", "Lost laptop"]);
    assert_eq!(list.count, 2);
}

#[tokio::test]
async fn bad_queries_are_reported() {
    let (h, ctx) = seeded().await;

    let err = h
        .store
        .list(&ctx, &ListParams::new().with_query(r#"(status == "open""#))
        .await
        .unwrap_err();
    assert_eq!(err, StoreError::Syntax);
    assert_eq!(err.to_string(), "invalid filter query: syntax error");

    let err = h
        .store
        .list(&ctx, &ListParams::new().with_query("severity == 3"))
        .await
        .unwrap_err();
    assert!(matches!(&err, StoreError::InvalidFilter(msg) if msg.contains("severity")));
}

#[tokio::test]
async fn sorted_by_fields_then_id() {
    let (h, ctx) = seeded().await;

    let list = h
        .store
        .list(&ctx, &ListParams::new().with_sort("owner", true))
        .await
        .unwrap();
    assert_eq!(names(&list), vec!["Malware beacon", "Phishing campaign", "Lost laptop"]);

    let list = h
        .store
        .list(&ctx, &ListParams::new().with_sort("type", false))
        .await
        .unwrap();
    assert_eq!(names(&list), vec!["Phishing campaign", "Malware beacon", "Lost laptop"]);
}

#[tokio::test]
async fn free_text_terms_go_through_the_index() {
    let (h, ctx) = seeded().await;
    let list = h
        .store
        .list(&ctx, &ListParams::new().with_query("beacon"))
        .await
        .unwrap();
    assert_eq!(names(&list), vec!["Malware beacon"]);

    let list = h
        .store
        .list(&ctx, &ListParams::new().with_query(r#"type == "alert" && !beacon"#))
        .await
        .unwrap();
    assert_eq!(names(&list), vec!["Phishing campaign"]);
}

#[tokio::test]
async fn count_takes_a_compiled_filter() {
    let (h, ctx) = seeded().await;
    let owned_by_amy = FilterClause::from_clause(Clause::eq(
        Operand::field(DEFAULT_PREFIX, "owner"),
        Operand::literal("amy"),
    ));

    assert_eq!(h.store.count(&ctx, Some("alert"), &owned_by_amy).await.unwrap(), 1);
    assert_eq!(h.store.count(&ctx, Some("incident"), &owned_by_amy).await.unwrap(), 0);
    assert_eq!(h.store.count(&ctx, None, &FilterClause::all()).await.unwrap(), 3);
}

#[tokio::test]
async fn cancelled_listing_fails() {
    let (h, _) = seeded().await;
    let ctx = RequestContext::for_user("bob");
    ctx.cancel();
    assert_eq!(
        h.store.list(&ctx, &ListParams::new()).await.unwrap_err(),
        StoreError::Canceled
    );
}
