//! Integration tests for sign-in, session verification, renewal and sign-out

use axum::http::{header, Method, Request, StatusCode};
use axum::body::Body;
use serde_json::json;
use sessionkeep_backend::store::UserStore;
use tower::ServiceExt;

use crate::test_utils::{
    body_json, body_text, browser_request, json_request, location, set_cookie_header, set_cookie_pair, TestApp,
    ALICE_EMAIL, ALICE_PASSWORD, COOKIE_NAME,
};

const ALICE_FORM: &str = "username=alice%40example.com&password=correct";

const HOUR: i64 = 60 * 60;
const DAY: i64 = 24 * HOUR;

fn sign_in_request(uri: &str, username: &str, password: &str) -> Request<Body> {
    json_request(
        Method::POST,
        uri,
        Some(json!({ "username": username, "password": password })),
        None,
    )
}

#[tokio::test]
async fn test_sign_in_with_correct_password() {
    let app = TestApp::new();

    let response = app
        .router
        .clone()
        .oneshot(sign_in_request("/sign-in", ALICE_EMAIL, ALICE_PASSWORD))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = set_cookie_header(&response).expect("session cookie set");
    assert!(cookie.contains("SameSite=Strict"));
    assert!(cookie.contains("Path=/"));
    assert!(cookie.contains("Expires="));
    assert!(!cookie.contains("HttpOnly"));

    let body = body_json(response).await;
    assert_eq!(body["redirect"], "/admin");
    assert_eq!(body["auth"]["user"]["username"], ALICE_EMAIL);
    assert_eq!(body["auth"]["user"]["role"], "admin");
    assert_eq!(body["auth"]["user"]["userid"], app.alice.id.to_string());
}

#[tokio::test]
async fn test_sign_in_with_wrong_password() {
    let app = TestApp::new();

    let response = app
        .router
        .clone()
        .oneshot(sign_in_request("/sign-in", ALICE_EMAIL, "wrong"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(set_cookie_header(&response).is_none());

    let body = body_json(response).await;
    assert_eq!(body["error"]["message"], "Username / password not recognised");
}

#[tokio::test]
async fn test_unknown_identity_looks_like_wrong_password() {
    let app = TestApp::new();

    let wrong = app
        .router
        .clone()
        .oneshot(sign_in_request("/sign-in", ALICE_EMAIL, "wrong"))
        .await
        .unwrap();
    let unknown = app
        .router
        .clone()
        .oneshot(sign_in_request("/sign-in", "mallory@example.com", ALICE_PASSWORD))
        .await
        .unwrap();

    assert_eq!(wrong.status(), unknown.status());
    assert!(set_cookie_header(&unknown).is_none());
    assert_eq!(body_json(wrong).await, body_json(unknown).await);
}

#[tokio::test]
async fn test_sign_in_redirects_to_requested_page() {
    let app = TestApp::new();

    let response = app
        .router
        .clone()
        .oneshot(sign_in_request("/sign-in/admin/users", ALICE_EMAIL, ALICE_PASSWORD))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["redirect"], "/admin/users");

    // no off-site redirects
    let response = app
        .router
        .clone()
        .oneshot(sign_in_request("/sign-in//evil.example.com", ALICE_EMAIL, ALICE_PASSWORD))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["redirect"], "/evil.example.com");
}

#[tokio::test]
async fn test_session_after_sign_in() {
    let app = TestApp::new();

    let response = app
        .router
        .clone()
        .oneshot(sign_in_request("/sign-in", ALICE_EMAIL, ALICE_PASSWORD))
        .await
        .unwrap();
    let cookie = set_cookie_pair(&response).unwrap();

    let response = app
        .router
        .clone()
        .oneshot(json_request(Method::GET, "/session", None, Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    // still valid: nothing to re-issue
    assert!(set_cookie_header(&response).is_none());

    let body = body_json(response).await;
    assert_eq!(body["auth"]["user"]["username"], ALICE_EMAIL);
}

#[tokio::test]
async fn test_anonymous_session_request() {
    let app = TestApp::new();

    let response = app
        .router
        .clone()
        .oneshot(json_request(Method::GET, "/session", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"]["code"], "AUTH_004");
}

#[tokio::test]
async fn test_expired_token_is_silently_renewed() {
    let app = TestApp::new();
    let cookie = app.alice_cookie_issued(2 * HOUR);

    let response = app
        .router
        .clone()
        .oneshot(json_request(Method::GET, "/session", None, Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let renewed = set_cookie_pair(&response).expect("renewed cookie issued");
    assert_ne!(renewed, cookie);
    assert_eq!(body_json(response).await["auth"]["user"]["username"], ALICE_EMAIL);

    // the renewed token is valid on its own
    let response = app
        .router
        .clone()
        .oneshot(json_request(Method::GET, "/session", None, Some(&renewed)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookie_header(&response).is_none());
}

#[tokio::test]
async fn test_cancelled_renewal_leaves_cookie_in_place() {
    let app = TestApp::new();
    app.store.set_cancel_renewal(app.alice.id, true).await.unwrap();
    let cookie = app.alice_cookie_issued(2 * HOUR);

    for _ in 0..2 {
        let response = app
            .router
            .clone()
            .oneshot(json_request(Method::GET, "/session", None, Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(set_cookie_header(&response).is_none());
    }

    // lifting the flag lets the same cookie renew
    app.store.set_cancel_renewal(app.alice.id, false).await.unwrap();
    let response = app
        .router
        .clone()
        .oneshot(json_request(Method::GET, "/session", None, Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookie_pair(&response).is_some());
}

#[tokio::test]
async fn test_token_past_inactivity_limit_is_rejected() {
    let app = TestApp::new();
    let cookie = app.alice_cookie_issued(31 * DAY);

    let response = app
        .router
        .clone()
        .oneshot(json_request(Method::GET, "/session", None, Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let removal = set_cookie_pair(&response).expect("cookie removal sent");
    assert_eq!(removal, format!("{COOKIE_NAME}="));
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "AUTH_003");
    assert_eq!(body["error"]["message"], "Session expired: please sign in again");
}

#[tokio::test]
async fn test_expired_session_on_public_route_is_rejected_too() {
    let app = TestApp::new();
    let cookie = app.alice_cookie_issued(31 * DAY);

    let response = app
        .router
        .clone()
        .oneshot(json_request(Method::GET, "/password/reset/0-00000000", None, Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(set_cookie_pair(&response).unwrap(), format!("{COOKIE_NAME}="));
}

#[tokio::test]
async fn test_forged_token_is_rejected() {
    let app = TestApp::new();
    let cookie = crate::test_utils::signed_cookie(&app.state, "eyJhbGciOiJIUzI1NiJ9.e30.c2lnbmF0dXJl");

    let response = app
        .router
        .clone()
        .oneshot(json_request(Method::GET, "/session", None, Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(set_cookie_pair(&response).unwrap(), format!("{COOKIE_NAME}="));
    assert_eq!(body_json(response).await["error"]["code"], "AUTH_001");
}

#[tokio::test]
async fn test_sign_out_clears_cookie() {
    let app = TestApp::new();
    let cookie = app.alice_cookie_issued(2 * HOUR);

    // an expired session would be renewed; sign-out must win over the renewal
    let response = app
        .router
        .clone()
        .oneshot(json_request(Method::POST, "/sign-out", None, Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let removal = set_cookie_header(&response).unwrap();
    assert!(removal.starts_with(&format!("{COOKIE_NAME}=;")));

    // signing out twice is harmless
    let response = app
        .router
        .clone()
        .oneshot(json_request(Method::POST, "/sign-out", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_html_clients_are_redirected_to_sign_in() {
    let app = TestApp::new();

    let request = Request::builder()
        .uri("/session?tab=profile")
        .header(header::ACCEPT, "text/html,application/xhtml+xml,*/*;q=0.8")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/sign-in/session?tab=profile"
    );
}

#[tokio::test]
async fn test_browser_follows_sign_in_redirect_back_to_page() {
    let app = TestApp::new();

    let response = app
        .router
        .clone()
        .oneshot(browser_request(Method::GET, "/session?tab=profile", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let sign_in = location(&response).unwrap();
    assert_eq!(sign_in, "/sign-in/session?tab=profile");

    // the redirect lands on a form posting back to the same place
    let response = app
        .router
        .clone()
        .oneshot(browser_request(Method::GET, &sign_in, None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get(header::CONTENT_TYPE).unwrap().to_str().unwrap();
    assert!(content_type.starts_with("text/html"));
    let page = body_text(response).await;
    assert!(page.contains(r#"action="/sign-in/session?tab=profile""#));

    let response = app
        .router
        .clone()
        .oneshot(browser_request(Method::POST, &sign_in, Some(ALICE_FORM), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response).unwrap(), "/session?tab=profile");
    let cookie = set_cookie_pair(&response).expect("session cookie set");

    let response = app
        .router
        .clone()
        .oneshot(browser_request(Method::GET, "/session?tab=profile", None, Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_browser_sign_in_without_target_goes_home() {
    let app = TestApp::new();

    let response = app
        .router
        .clone()
        .oneshot(browser_request(Method::POST, "/sign-in", Some(ALICE_FORM), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response).unwrap(), "/admin");
    assert!(set_cookie_pair(&response).is_some());
}

#[tokio::test]
async fn test_failed_browser_sign_in_shows_form_again() {
    let app = TestApp::new();

    let response = app
        .router
        .clone()
        .oneshot(browser_request(
            Method::POST,
            "/sign-in/admin",
            Some("username=alice%40example.com&password=wrong"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(set_cookie_header(&response).is_none());
    let page = body_text(response).await;
    assert!(page.contains("Username / password not recognised"));
    assert!(page.contains(r#"action="/sign-in/admin""#));
}

#[tokio::test]
async fn test_signed_in_user_skips_sign_in_form() {
    let app = TestApp::new();
    let cookie = app.alice_cookie_issued(0);

    let response = app
        .router
        .clone()
        .oneshot(browser_request(Method::GET, "/sign-in/admin/users", None, Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response).unwrap(), "/admin/users");

    // no target: the form, with a notice
    let response = app
        .router
        .clone()
        .oneshot(browser_request(Method::GET, "/sign-in", None, Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("signed in as alice@example.com"));
}

#[tokio::test]
async fn test_browser_sign_out_returns_to_sign_in() {
    let app = TestApp::new();
    let cookie = app.alice_cookie_issued(0);

    let response = app
        .router
        .clone()
        .oneshot(browser_request(Method::POST, "/sign-out", None, Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response).unwrap(), "/sign-in");
    assert_eq!(set_cookie_pair(&response).unwrap(), format!("{COOKIE_NAME}="));
}
