// ============================
// crates/backend-lib/src/handlers/register.rs
// ============================
//! Self-registration.
//!
//! A new identity has no password. The registrant is sent on to the password
//! reset workflow, which is how a first password gets chosen.
use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Extension, Json,
};
use metrics::counter;
use serde::Deserialize;
use sessionkeep_common::{RegisterForm, Registered, Role};
use tracing::{info, warn};

use super::extract::{wants_json, JsonOrForm};
use super::password::request_origin;
use crate::error::AppError;
use crate::mail::REGISTER_EMAIL_TEMPLATE;
use crate::metrics as keys;
use crate::middleware::AuthState;
use crate::store::{EmailClaim, User, UserStore};
use crate::AppState;

/// Where a new registrant chooses a password
pub const RESET_REQUEST_PATH: &str = "/password/reset-request";

const REGISTER_EMAIL_SUBJECT: &str = "Registration";

/// Trimmed e-mail address, or [`AppError::InvalidInput`] if it can't be one
pub(crate) fn normalise_email(raw: &str) -> Result<String, AppError> {
    let email = raw.trim();
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty() && !domain.contains('@'));
    if !valid || email.chars().any(char::is_whitespace) {
        return Err(AppError::InvalidInput("A valid e-mail address is required".to_string()));
    }
    Ok(email.to_string())
}

/// POST /register
pub async fn register<S: UserStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    JsonOrForm(form): JsonOrForm<RegisterForm>,
) -> Result<Response, AppError> {
    let email = normalise_email(&form.username)?;
    let user = User::new(email, form.firstname.trim(), form.lastname.trim(), String::new(), Role::User);

    let user = match state.store.create_user(user).await.map_err(AppError::Store)? {
        EmailClaim::Done(user) => user,
        EmailClaim::Taken | EmailClaim::NotFound => return Err(AppError::EmailTaken),
    };
    counter!(keys::REGISTERED).increment(1);
    info!(userid = %user.id, email = %user.email, "registered");

    let mut context = HashMap::new();
    context.insert("name", user.firstname.clone());
    context.insert("origin", request_origin(&headers));
    // the identity exists either way; the reset workflow still works without this mail
    if let Err(err) = state
        .mailer
        .send_templated(&user.email, REGISTER_EMAIL_SUBJECT, REGISTER_EMAIL_TEMPLATE, &context)
        .await
    {
        warn!(email = %user.email, error = %err, "registration mail not sent");
    }

    if wants_json(&headers) {
        let body = Registered {
            userid: user.id,
            redirect: RESET_REQUEST_PATH.to_string(),
        };
        return Ok((StatusCode::CREATED, Json(body)).into_response());
    }
    Ok(Redirect::to(RESET_REQUEST_PATH).into_response())
}

/// Query for `/register/available`; `username` and `email` are synonyms
#[derive(Debug, Default, Deserialize)]
pub struct AvailabilityQuery {
    pub username: Option<String>,
    pub email: Option<String>,
}

/// GET /register/available?username=..
///
/// 200 if the address is free or belongs to the signed-in caller, 403 if
/// another identity holds it, 406 if no address was given.
pub async fn register_available<S: UserStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Extension(AuthState(auth)): Extension<AuthState>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<StatusCode, AppError> {
    let Some(email) = query.username.or(query.email) else {
        return Ok(StatusCode::NOT_ACCEPTABLE);
    };
    let caller = auth.map(|a| a.user.userid);
    let holder = state
        .store
        .find_by_email(email.trim())
        .await
        .map_err(AppError::Store)?;

    Ok(match holder {
        Some(user) if Some(user.id) != caller => StatusCode::FORBIDDEN,
        _ => StatusCode::OK,
    })
}
