//! Integration tests for the dialog relay.
//!
//! An integration proves which user to address by echoing the signed trigger
//! id it received when the action fired.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use futures::StreamExt;
use postaction_core::{EVENT_OPEN_DIALOG, OpenDialogRequest, PostActionApiResponse, UserId};
use postaction_integration_tests::{MEMBER, TestContext};
use serde_json::{Value, json};

/// Fire the seeded button and return `(client form, request form)`.
async fn fire_and_capture(ctx: &TestContext) -> (String, String) {
    let response = ctx.fire("approve", MEMBER, json!({})).await;
    assert_eq!(response.status(), 200);
    let body: PostActionApiResponse = response.json().await.unwrap();

    let signed = ctx.integration.requests()[0].trigger_id.clone();
    (body.trigger_id, signed)
}

fn dialog_body(trigger_id: &str) -> Value {
    json!({
        "trigger_id": trigger_id,
        "url": "http://localhost:8065/plugins/deploy/submit",
        "dialog": {
            "callback_id": "deploy",
            "title": "Confirm deploy",
            "elements": [
                {"display_name": "Reason", "name": "reason", "type": "text"}
            ]
        }
    })
}

// =============================================================================
// Delivery
// =============================================================================

#[tokio::test]
async fn test_dialog_reaches_the_acting_user() {
    let ctx = TestContext::new().await;
    let (client_id, signed) = fire_and_capture(&ctx).await;

    let mut events = Box::pin(ctx.state.events().subscribe(UserId::new(MEMBER)));

    let response = ctx.open_dialog(dialog_body(&signed)).await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"status": "OK"}));

    let event = tokio::time::timeout(Duration::from_secs(5), events.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.event, EVENT_OPEN_DIALOG);
    assert_eq!(event.broadcast.user_id.as_str(), MEMBER);

    let relayed: OpenDialogRequest =
        serde_json::from_str(event.data["dialog"].as_str().unwrap()).unwrap();
    assert_eq!(relayed.trigger_id, client_id);
    assert_eq!(relayed.dialog.title, "Confirm deploy");
    assert_eq!(relayed.dialog.elements.len(), 1);
}

#[tokio::test]
async fn test_trigger_id_opens_one_dialog() {
    let ctx = TestContext::new().await;
    let (_, signed) = fire_and_capture(&ctx).await;

    let first = ctx.open_dialog(dialog_body(&signed)).await;
    assert_eq!(first.status(), 200);

    let second = ctx.open_dialog(dialog_body(&signed)).await;
    assert_eq!(second.status(), 400);
}

// =============================================================================
// Rejection
// =============================================================================

#[tokio::test]
async fn test_client_form_is_not_accepted() {
    let ctx = TestContext::new().await;
    let (client_id, _) = fire_and_capture(&ctx).await;

    let response = ctx.open_dialog(dialog_body(&client_id)).await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_incomplete_requests_are_bad_requests() {
    let ctx = TestContext::new().await;

    let mut no_url = dialog_body("abc");
    no_url["url"] = json!("");
    let cases = [
        json!({}),
        no_url,
        dialog_body(""),
        dialog_body("Zm9yZ2VkOnRva2Vu"),
    ];

    for body in cases {
        let response = ctx.open_dialog(body.clone()).await;
        assert_eq!(response.status(), 400, "body {body}");
    }
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let ctx = TestContext::new().await;

    let response = ctx
        .client
        .post(ctx.url("/api/v4/actions/dialogs/open"))
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
}
