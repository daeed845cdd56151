//! Integration tests for externally delivered chore write events.

use axum::http::{Method, StatusCode};
use serde_json::{Value, json};

use choreboard_integration_tests::{TestContext, member};

const TRIGGER: &str = "/v1/triggers/chore-written";

fn chore(status: &str, completed_at: Option<&str>) -> Value {
    json!({
        "title": "Vacuum",
        "assignees": ["a", "b", "a"],
        "dueAt": "2026-05-01T10:00:00Z",
        "points": 5,
        "status": status,
        "createdBy": "a",
        "createdAt": "2026-04-30T10:00:00Z",
        "completedAt": completed_at,
    })
}

fn context() -> TestContext {
    let ctx = TestContext::new();
    ctx.seed("household-1", "a", "qr-a");
    ctx.store.put_member(member("household-1", "b", "qr-b"));
    ctx
}

fn completion() -> Value {
    json!({
        "path": "households/household-1/chores/c1",
        "before": chore("open", None),
        "after": chore("done", Some("2026-05-01T09:30:00Z")),
    })
}

#[tokio::test]
async fn test_completion_awards_each_assignee_once() {
    let ctx = context();

    let (status, response) = ctx.send(Method::POST, TRIGGER, None, Some(completion())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response, json!({ "awarded": true, "assignees": 2 }));
    assert_eq!(ctx.member("household-1", "a").await.points, 5);
    assert_eq!(ctx.member("household-1", "b").await.points, 5);
}

#[tokio::test]
async fn test_redelivery_awards_once() {
    let ctx = context();

    ctx.send(Method::POST, TRIGGER, None, Some(completion())).await;
    let (status, response) = ctx.send(Method::POST, TRIGGER, None, Some(completion())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response, json!({ "awarded": false, "assignees": 0 }));
    assert_eq!(ctx.member("household-1", "a").await.points, 5);
    assert_eq!(ctx.store.completion_count(), 1);
}

#[tokio::test]
async fn test_non_completion_edges_ignored() {
    let ctx = context();
    let done = chore("done", Some("2026-05-01T09:30:00Z"));

    for event in [
        // created already done
        json!({ "path": "households/household-1/chores/c1", "after": done.clone() }),
        // done edited while done
        json!({ "path": "households/household-1/chores/c1", "before": done.clone(), "after": done.clone() }),
        // reopened
        json!({ "path": "households/household-1/chores/c1", "before": done.clone(), "after": chore("open", None) }),
        // deleted
        json!({ "path": "households/household-1/chores/c1", "before": chore("open", None), "after": null }),
    ] {
        let (status, response) = ctx.send(Method::POST, TRIGGER, None, Some(event)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response["awarded"], false);
    }
    assert_eq!(ctx.member("household-1", "a").await.points, 0);
}

#[tokio::test]
async fn test_malformed_events_rejected() {
    let ctx = context();

    for event in [
        json!({ "path": "households/household-1/members/a", "after": chore("done", None) }),
        json!({ "path": "chores/c1", "after": chore("done", None) }),
        json!({ "path": "households/household-1/chores/c1", "after": { "status": "closed" } }),
    ] {
        let (status, response) = ctx.send(Method::POST, TRIGGER, None, Some(event)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["error"]["code"], "invalid-argument");
    }
}

#[tokio::test]
async fn test_assignee_without_member_record_skipped() {
    let ctx = TestContext::new();
    ctx.seed("household-1", "a", "qr-a");

    let (_, response) = ctx.send(Method::POST, TRIGGER, None, Some(completion())).await;
    assert_eq!(response, json!({ "awarded": true, "assignees": 1 }));
    assert_eq!(ctx.member("household-1", "a").await.points, 5);
}

#[tokio::test]
async fn test_points_beyond_stored_range_rejected() {
    let ctx = context();
    let mut after = chore("done", Some("2026-05-01T09:30:00Z"));
    after["points"] = json!(3_000_000_000_u64);

    let event = json!({
        "path": "households/household-1/chores/c1",
        "before": chore("open", None),
        "after": after,
    });
    let (status, response) = ctx.send(Method::POST, TRIGGER, None, Some(event)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"]["code"], "invalid-argument");
    assert_eq!(ctx.member("household-1", "a").await.points, 0);
    assert_eq!(ctx.store.completion_count(), 0);
}
