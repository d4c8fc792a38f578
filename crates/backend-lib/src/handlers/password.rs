// ============================
// crates/backend-lib/src/handlers/password.rs
// ============================
//! Password reset handlers.
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode, Uri},
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use sessionkeep_common::{Ack, ResetForm, ResetRequestForm};
use tracing::debug;

use super::extract::{wants_json, JsonOrForm};
use crate::auth::ResetRequestOutcome;
use crate::error::AppError;
use crate::pages::{message_page, reset_page, reset_request_page};
use crate::store::UserStore;
use crate::AppState;

/// Response header echoing an issued reset token when enabled in config
pub const RESET_TOKEN_HEADER: HeaderName = HeaderName::from_static("x-reset-token");

const REQUEST_ACK: &str = "If that address is registered, a password reset link has been sent to it";

/// GET /password/reset-request
pub async fn reset_request_form() -> Html<String> {
    Html(reset_request_page())
}

/// POST /password/reset-request
///
/// Answers the same whether or not the address is registered.
pub async fn reset_request<S: UserStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    JsonOrForm(form): JsonOrForm<ResetRequestForm>,
) -> Result<Response, AppError> {
    let origin = request_origin(&headers);
    let outcome = state.resets.request(&form.username, &origin).await?;

    let mut response = if wants_json(&headers) {
        (StatusCode::ACCEPTED, Json(Ack::new(REQUEST_ACK))).into_response()
    } else {
        (StatusCode::ACCEPTED, Html(message_page("Check your e-mail", REQUEST_ACK))).into_response()
    };
    if let ResetRequestOutcome::Sent(token) = outcome {
        if state.settings.reset.expose_token_header {
            debug!(token = %token, "reset token exposed in response header");
            if let Ok(value) = HeaderValue::from_str(token.as_str()) {
                response.headers_mut().insert(RESET_TOKEN_HEADER, value);
            }
        }
    }
    Ok(response)
}

/// GET /password/reset/{token}: confirms the token, or for browsers shows the
/// new-password form
pub async fn reset_check<S: UserStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(token): Path<String>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Response, AppError> {
    if state.resets.validate(&token).await?.is_none() {
        return Err(AppError::BadResetToken);
    }
    if wants_json(&headers) {
        return Ok(Json(Ack::new("Choose a new password")).into_response());
    }
    Ok(Html(reset_page(uri.path())).into_response())
}

/// POST /password/reset/{token}
pub async fn reset<S: UserStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(token): Path<String>,
    headers: HeaderMap,
    JsonOrForm(form): JsonOrForm<ResetForm>,
) -> Result<Response, AppError> {
    if form.password != form.password_confirm {
        return Err(AppError::InvalidInput("Passwords don't match".to_string()));
    }
    state.resets.consume(&token, form.password).await?;
    if wants_json(&headers) {
        return Ok(Json(Ack::new("Your password has been reset")).into_response());
    }
    Ok(Redirect::to("/sign-in").into_response())
}

/// Origin for links in reset e-mails: the `Origin` header, else built from `Host`
pub(crate) fn request_origin(headers: &HeaderMap) -> String {
    let header_str = |name: HeaderName| headers.get(name).and_then(|v| v.to_str().ok());
    match (header_str(header::ORIGIN), header_str(header::HOST)) {
        (Some(origin), _) => origin.to_string(),
        (None, Some(host)) => format!("http://{host}"),
        (None, None) => String::new(),
    }
}
