// SPDX-FileCopyrightText: 2026 Solace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request-level tests for the polling/action surface, driven through the
//! axum router with mock collaborators behind the engine.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use solace_engine::Engine;
use solace_gateway::{build_router, AuthConfig, GatewayState};
use solace_test_utils::{MockResponder, TestHarness};
use tower::ServiceExt;

async fn app(h: &TestHarness, bearer_token: Option<&str>) -> Router {
    let engine = Arc::new(Engine::new(
        h.db.clone(),
        h.responder.clone(),
        h.dispatcher.clone(),
        h.audit.clone(),
        &h.config,
    ));
    build_router(GatewayState {
        engine,
        auth: AuthConfig {
            bearer_token: bearer_token.map(str::to_string),
        },
    })
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn get_as(user: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-solace-user", user)
        .body(Body::empty())
        .unwrap()
}

fn post_form_as(user: &str, uri: &str, form: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("x-solace-user", user)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let h = TestHarness::new().await;
    let app = app(&h, Some("token")).await;

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn api_requires_bearer_token_when_configured() {
    let h = TestHarness::new().await;
    let app = app(&h, Some("sekrit")).await;

    let response = app
        .clone()
        .oneshot(get_as("t-1", "/api/get_unread_counts"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let mut request = get_as("t-1", "/api/get_unread_counts");
    request
        .headers_mut()
        .insert(header::AUTHORIZATION, "Bearer sekrit".parse().unwrap());
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_caller_identity_is_unauthorized() {
    let h = TestHarness::new().await;
    let app = app(&h, None).await;

    let response = app
        .clone()
        .oneshot(get_as("ghost", "/api/get_unread_counts"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Missing header entirely.
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/get_unread_counts")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn send_message_form_then_check_updates_query() {
    let h = TestHarness::new().await;
    let app = app(&h, None).await;
    h.responder
        .push_reply(MockResponder::benign("thanks for telling me"))
        .await;

    // POST form-encoded send.
    let response = app
        .clone()
        .oneshot(post_form_as(
            "p-1",
            "/api/send_message",
            "conversation_id=c-1&text=rough+day",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["ai_status"], "replied");
    assert_eq!(json["escalated"], false);

    // GET query-string probe sees both the patient message and the reply.
    let response = app
        .oneshot(get_as("t-1", "/api/check_updates?conversation_id=c-1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["unread_count"], 2);
}

#[tokio::test]
async fn paused_conversation_returns_the_configured_notice() {
    let h = TestHarness::new().await;
    let app = app(&h, None).await;

    let response = app
        .clone()
        .oneshot(post_form_as(
            "t-1",
            "/api/set_status",
            "conversation_id=c-1&status=paused",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(post_form_as(
            "p-1",
            "/api/send_message",
            "conversation_id=c-1&text=hello",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert_eq!(json["state"], "paused");
    assert_eq!(
        json["notice"],
        h.config.safety.paused_notice.as_str(),
        "patients get the explanatory notice, not a generic error"
    );
}

#[tokio::test]
async fn toggle_ai_restores_service_after_lockdown() {
    let h = TestHarness::new().await;
    let app = app(&h, None).await;
    h.responder
        .push_reply(MockResponder::unassessed("hold on"))
        .await;

    // Trigger the keyword lockdown.
    let response = app
        .clone()
        .oneshot(post_form_as(
            "p-1",
            "/api/send_message",
            "conversation_id=c-1&text=I+want+to+end+it",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["escalated"], true);

    // Metadata shows blocked with the blocked notice.
    let response = app
        .clone()
        .oneshot(get_as("t-1", "/api/get_conversation?conversation_id=c-1"))
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["conversation"]["blocked"], true);
    assert_eq!(json["conversation"]["ai_enabled"], false);
    assert_eq!(json["notice"], h.config.safety.blocked_notice.as_str());

    // One action restores full service.
    let response = app
        .clone()
        .oneshot(post_form_as(
            "t-1",
            "/api/toggle_ai",
            "conversation_id=c-1&enabled=true",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["conversation"]["blocked"], false);
    assert_eq!(json["conversation"]["ai_enabled"], true);
}

#[tokio::test]
async fn outsider_therapist_is_forbidden() {
    let h = TestHarness::new().await;
    let app = app(&h, None).await;

    let response = app
        .oneshot(get_as("t-9", "/api/get_conversation?conversation_id=c-1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn draft_flow_over_http() {
    let h = TestHarness::new().await;
    let app = app(&h, None).await;
    h.responder.push_reply(MockResponder::benign("draft one")).await;
    h.responder.push_reply(MockResponder::benign("draft two")).await;

    let response = app
        .clone()
        .oneshot(post_form_as("t-1", "/api/create_draft", "conversation_id=c-1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let draft_id = json["draft"]["id"].as_i64().unwrap();
    assert_eq!(json["draft"]["body"], "draft one");

    let response = app
        .clone()
        .oneshot(post_form_as(
            "t-1",
            "/api/regenerate_draft",
            &format!("draft_id={draft_id}"),
        ))
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["draft"]["body"], "draft two");

    let response = app
        .clone()
        .oneshot(post_form_as(
            "t-1",
            "/api/send_draft",
            &format!("draft_id={draft_id}"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["message"]["body"], "draft two");
    assert_eq!(json["draft"]["state"], "sent");

    // Editing after send is an invalid transition.
    let response = app
        .oneshot(post_form_as(
            "t-1",
            "/api/edit_draft",
            &format!("draft_id={draft_id}&text=late"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn mark_all_alerts_read_is_idempotent_over_http() {
    let h = TestHarness::new().await;
    let app = app(&h, None).await;

    // Directed message raises a tag alert.
    app.clone()
        .oneshot(post_form_as(
            "p-1",
            "/api/send_message",
            "conversation_id=c-1&text=%40therapist+please",
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(post_form_as("t-1", "/api/mark_all_alerts_read", ""))
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["marked"], 1);
    assert_eq!(json["counts"]["total_alerts"], 0);

    let response = app
        .oneshot(post_form_as("t-1", "/api/mark_all_alerts_read", ""))
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["marked"], 0);
    assert_eq!(json["counts"]["total_alerts"], 0);
}

#[tokio::test]
async fn export_csv_returns_a_csv_attachment() {
    let h = TestHarness::new().await;
    let app = app(&h, None).await;
    h.responder.push_reply(MockResponder::benign("noted")).await;

    app.clone()
        .oneshot(post_form_as(
            "p-1",
            "/api/send_message",
            "conversation_id=c-1&text=for+the+record",
        ))
        .await
        .unwrap();

    let response = app
        .oneshot(get_as("t-1", "/api/export_csv?scope=group&group_id=grp-a"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/csv"));
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("for the record"));
}
