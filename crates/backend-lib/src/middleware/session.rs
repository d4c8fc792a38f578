// ============================
// crates/backend-lib/src/middleware/session.rs
// ============================
//! Session verification on every request.
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use sessionkeep_common::AuthPayload;
use tracing::debug;

use crate::{error::AppError, store::UserStore, AppState};

/// Authenticated state for the current request; `None` means anonymous
#[derive(Debug, Clone, Default)]
pub struct AuthState(pub Option<AuthPayload>);

/// Verify (and if need be renew) the session cookie, publish the result as an
/// [`AuthState`] request extension, and send any cookie change back.
///
/// A rejected token fails the request with 401 and the cookie deletion.
pub async fn authenticate<S: UserStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let mut ctx = state.sessions.context::<AuthPayload>(request.headers());
    if let Err(err) = state.sessions.verify(&mut ctx).await {
        return (ctx.jar, err).into_response();
    }

    let (jar, auth) = ctx.into_parts();
    request.extensions_mut().insert(AuthState(auth));
    let response = next.run(request).await;

    // sign-in and sign-out write the cookie themselves; theirs wins
    if sets_cookie(&response, state.sessions.cookie_name()) {
        debug!("handler replaced the session cookie");
        return response;
    }
    (jar, response).into_response()
}

/// Reject anonymous requests
pub async fn require_auth(request: Request<Body>, next: Next) -> Result<Response, AppError> {
    match request.extensions().get::<AuthState>() {
        Some(AuthState(Some(_))) => Ok(next.run(request).await),
        _ => Err(AppError::Unauthenticated),
    }
}

fn sets_cookie(response: &Response, name: &str) -> bool {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| {
            value
                .split_once('=')
                .is_some_and(|(cookie, _)| cookie.trim() == name)
        })
}
