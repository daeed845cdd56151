//! Integration tests for the chore routes.

use axum::http::{Method, StatusCode};
use serde_json::json;

use choreboard_integration_tests::{TestContext, member};

const LIST: &str = "/v1/households/household-1/chores";

async fn signed_in() -> (TestContext, String) {
    let ctx = TestContext::new();
    ctx.seed("household-1", "parent", "abc123");
    let token = ctx.sign_in("household-1", "parent", "abc123").await;
    (ctx, token)
}

#[tokio::test]
async fn test_create_applies_defaults() {
    let (ctx, token) = signed_in().await;

    let (status, chore) = ctx
        .send(
            Method::POST,
            LIST,
            Some(&token),
            Some(json!({ "title": "Dishes" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(chore["title"], "Dishes");
    assert_eq!(chore["status"], "open");
    assert_eq!(chore["points"], 1);
    assert_eq!(chore["assignees"], json!(["parent"]));
    assert_eq!(chore["createdBy"], "parent");
    assert!(chore["completedAt"].is_null());
    assert!(chore["id"].is_string());
}

#[tokio::test]
async fn test_blank_title_rejected() {
    let (ctx, token) = signed_in().await;
    let (status, response) = ctx
        .send(Method::POST, LIST, Some(&token), Some(json!({ "title": "  " })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"]["code"], "invalid-argument");
}

#[tokio::test]
async fn test_list_orders_by_due_time() {
    let (ctx, token) = signed_in().await;
    for (title, due) in [
        ("Later", "2026-05-02T10:00:00Z"),
        ("Sooner", "2026-05-01T10:00:00Z"),
    ] {
        let (status, _) = ctx
            .send(
                Method::POST,
                LIST,
                Some(&token),
                Some(json!({ "title": title, "dueAt": due })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, chores) = ctx.send(Method::GET, LIST, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let titles: Vec<&str> = chores
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Sooner", "Later"]);
}

#[tokio::test]
async fn test_toggle_awards_assignees_once() {
    let (ctx, token) = signed_in().await;
    ctx.store.put_member(member("household-1", "kid", "kid-qr"));

    let (_, chore) = ctx
        .send(
            Method::POST,
            LIST,
            Some(&token),
            Some(json!({ "title": "Laundry", "assignees": ["kid", "parent"], "points": 3 })),
        )
        .await;
    let toggle = format!("{LIST}/{}/toggle", chore["id"].as_str().unwrap());

    let (status, done) = ctx.send(Method::POST, &toggle, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(done["status"], "done");
    assert_eq!(done["awarded"], true);
    assert!(done["completedAt"].is_string());
    assert_eq!(ctx.member("household-1", "kid").await.points, 3);
    assert_eq!(ctx.member("household-1", "parent").await.points, 3);

    // Reopening clears completion and awards nothing.
    let (_, reopened) = ctx.send(Method::POST, &toggle, Some(&token), None).await;
    assert_eq!(reopened["status"], "open");
    assert_eq!(reopened["awarded"], false);
    assert!(reopened["completedAt"].is_null());
    assert_eq!(ctx.member("household-1", "kid").await.points, 3);

    // Completing again is a new completion.
    let (_, again) = ctx.send(Method::POST, &toggle, Some(&token), None).await;
    assert_eq!(again["awarded"], true);
    assert_eq!(ctx.member("household-1", "kid").await.points, 6);
}

#[tokio::test]
async fn test_toggle_missing_chore() {
    let (ctx, token) = signed_in().await;
    let (status, response) = ctx
        .send(
            Method::POST,
            &format!("{LIST}/no-such-chore/toggle"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(response["error"]["code"], "not-found");
}

#[tokio::test]
async fn test_requires_credential() {
    let ctx = TestContext::new();
    ctx.seed("household-1", "parent", "abc123");

    let (status, response) = ctx.send(Method::GET, LIST, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(response["error"]["code"], "unauthenticated");

    let (status, _) = ctx
        .send(Method::GET, LIST, Some("forged.token"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_credential_scoped_to_household() {
    let (ctx, token) = signed_in().await;
    ctx.seed("household-2", "other", "xyz789");

    let (status, response) = ctx
        .send(
            Method::GET,
            "/v1/households/household-2/chores",
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(response["error"]["code"], "permission-denied");

    let (status, _) = ctx
        .send(
            Method::POST,
            "/v1/households/household-2/chores",
            Some(&token),
            Some(json!({ "title": "Sneaky" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
