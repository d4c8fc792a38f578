//! Integration tests for the password reset flow

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use serde_json::json;
use sessionkeep_backend::{
    auth::ResetToken,
    auth::token::unix_now,
    handlers::password::RESET_TOKEN_HEADER,
    store::UserStore,
};
use tower::ServiceExt;

use crate::test_utils::{body_json, json_request, test_settings, TestApp, ALICE_EMAIL, ALICE_PASSWORD};

const NEW_PASSWORD: &str = "Br4nd-New-Secret!";

async fn request_reset(app: &TestApp, username: &str) -> axum::response::Response {
    let request = json_request(
        Method::POST,
        "/password/reset-request",
        Some(json!({ "username": username })),
        None,
    );
    app.router.clone().oneshot(request).await.unwrap()
}

async fn reset_token_for_alice(app: &TestApp) -> String {
    let response = request_reset(app, ALICE_EMAIL).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    response
        .headers()
        .get(RESET_TOKEN_HEADER)
        .expect("test settings expose the token")
        .to_str()
        .unwrap()
        .to_string()
}

fn reset_request(token: &str, password: &str, confirm: &str) -> Request<Body> {
    json_request(
        Method::POST,
        &format!("/password/reset/{token}"),
        Some(json!({ "password": password, "passwordConfirm": confirm })),
        None,
    )
}

#[tokio::test]
async fn test_reset_request_answers_the_same_for_unknown_identity() {
    let app = TestApp::new();

    let known = request_reset(&app, ALICE_EMAIL).await;
    let unknown = request_reset(&app, "mallory@example.com").await;

    assert_eq!(known.status(), StatusCode::ACCEPTED);
    assert_eq!(unknown.status(), StatusCode::ACCEPTED);
    assert!(unknown.headers().get(RESET_TOKEN_HEADER).is_none());
    assert_eq!(body_json(known).await, body_json(unknown).await);

    // only the registered address gets mail
    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, ALICE_EMAIL);
}

#[tokio::test]
async fn test_reset_mail_carries_link() {
    let app = TestApp::new();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/password/reset-request")
        .header(header::ACCEPT, "application/json")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::ORIGIN, "https://accounts.example.com")
        .body(Body::from(json!({ "username": ALICE_EMAIL }).to_string()))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    let token = response.headers().get(RESET_TOKEN_HEADER).unwrap().to_str().unwrap().to_string();

    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].body.contains("Hi Alice"));
    assert!(sent[0]
        .body
        .contains(&format!("https://accounts.example.com/password/reset/{token}")));
    assert_eq!(sent[0].subject, "Password reset");
}

#[tokio::test]
async fn test_token_header_hidden_by_default() {
    let mut settings = test_settings();
    settings.reset.expose_token_header = false;
    let app = TestApp::with_settings(settings);

    let response = request_reset(&app, ALICE_EMAIL).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert!(response.headers().get(RESET_TOKEN_HEADER).is_none());

    // the token was still stored and mailed
    let stored = app.store.find_by_id(app.alice.id).await.unwrap().unwrap();
    assert!(stored.reset_token.is_some());
    assert_eq!(app.mailer.sent().len(), 1);
}

#[tokio::test]
async fn test_full_reset_flow() {
    let app = TestApp::new();
    let token = reset_token_for_alice(&app).await;

    let response = app
        .router
        .clone()
        .oneshot(json_request(Method::GET, &format!("/password/reset/{token}"), None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .router
        .clone()
        .oneshot(reset_request(&token, NEW_PASSWORD, NEW_PASSWORD))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // old password out, new password in
    let sign_in = |password: &str| {
        json_request(
            Method::POST,
            "/sign-in",
            Some(json!({ "username": ALICE_EMAIL, "password": password })),
            None,
        )
    };
    let response = app.router.clone().oneshot(sign_in(ALICE_PASSWORD)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let response = app.router.clone().oneshot(sign_in(NEW_PASSWORD)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_token_is_single_use() {
    let app = TestApp::new();
    let token = reset_token_for_alice(&app).await;

    let response = app
        .router
        .clone()
        .oneshot(reset_request(&token, NEW_PASSWORD, NEW_PASSWORD))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .router
        .clone()
        .oneshot(reset_request(&token, "An0ther-Secret!", "An0ther-Secret!"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["code"], "RESET_001");
}

#[tokio::test]
async fn test_new_request_invalidates_previous_token() {
    let app = TestApp::new();
    let first = reset_token_for_alice(&app).await;
    let second = reset_token_for_alice(&app).await;
    assert_ne!(first, second);

    let response = app
        .router
        .clone()
        .oneshot(json_request(Method::GET, &format!("/password/reset/{first}"), None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_expired_unknown_and_used_tokens_look_the_same() {
    let app = TestApp::new();

    let stale = ResetToken::generate(unix_now() - 25 * 60 * 60);
    app.store.set_reset_token(app.alice.id, stale.as_str()).await.unwrap();

    let expired = app
        .router
        .clone()
        .oneshot(json_request(Method::GET, &format!("/password/reset/{stale}"), None, None))
        .await
        .unwrap();
    let unknown = app
        .router
        .clone()
        .oneshot(json_request(Method::GET, "/password/reset/0-zzzzzzzz", None, None))
        .await
        .unwrap();

    assert_eq!(expired.status(), StatusCode::BAD_REQUEST);
    assert_eq!(expired.status(), unknown.status());
    assert_eq!(body_json(expired).await, body_json(unknown).await);

    // the expired token was cleared when it was looked at
    let stored = app.store.find_by_id(app.alice.id).await.unwrap().unwrap();
    assert_eq!(stored.reset_token, None);
}

#[tokio::test]
async fn test_mismatched_or_weak_password_keeps_token() {
    let app = TestApp::new();
    let token = reset_token_for_alice(&app).await;

    let response = app
        .router
        .clone()
        .oneshot(reset_request(&token, NEW_PASSWORD, "something else"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["code"], "VAL_001");

    let response = app
        .router
        .clone()
        .oneshot(reset_request(&token, "weak", "weak"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["code"], "VAL_001");

    let response = app
        .router
        .clone()
        .oneshot(reset_request(&token, NEW_PASSWORD, NEW_PASSWORD))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_bad_token_page_for_html_clients() {
    let app = TestApp::new();
    let request = Request::builder()
        .uri("/password/reset/0-zzzzzzzz")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let content_type = response.headers().get(header::CONTENT_TYPE).unwrap().to_str().unwrap();
    assert!(content_type.starts_with("text/html"));
}
