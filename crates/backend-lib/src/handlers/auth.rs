// ============================
// crates/backend-lib/src/handlers/auth.rs
// ============================
//! Sign-in, sign-out, session and profile handlers.
use std::sync::Arc;

use axum::{
    extract::{Path, RawQuery, State},
    http::{HeaderMap, Uri},
    response::{Html, IntoResponse, Redirect, Response},
    Extension, Json,
};
use metrics::counter;
use sessionkeep_common::{Ack, AuthPayload, Profile, ProfileForm, SessionInfo, SignInForm, SignedIn};
use tracing::info;

use super::extract::{wants_json, JsonOrForm};
use super::register::normalise_email;
use crate::auth::CredentialCheck;
use crate::error::AppError;
use crate::metrics as keys;
use crate::middleware::AuthState;
use crate::pages::sign_in_page;
use crate::store::{EmailClaim, ProfileUpdate, UserStore};
use crate::AppState;

/// GET /sign-in
pub async fn sign_in_form(Extension(AuthState(auth)): Extension<AuthState>, uri: Uri) -> Response {
    render_sign_in(auth, None, &uri)
}

/// GET /sign-in/{*next}: the sign-in form, or straight on to `/{next}` if
/// already signed in
pub async fn sign_in_form_then(
    Extension(AuthState(auth)): Extension<AuthState>,
    Path(next): Path<String>,
    uri: Uri,
) -> Response {
    render_sign_in(auth, Some(next), &uri)
}

fn render_sign_in(auth: Option<AuthPayload>, next: Option<String>, uri: &Uri) -> Response {
    let target = next.as_deref().and_then(|n| local_path(n, uri.query()));
    if let (Some(_), Some(target)) = (&auth, target) {
        return Redirect::to(&target).into_response();
    }
    let action = uri.path_and_query().map_or("/sign-in", |pq| pq.as_str());
    let signed_in_as = auth.as_ref().map(|a| a.user.username.as_str());
    Html(sign_in_page(action, signed_in_as, None)).into_response()
}

/// POST /sign-in
pub async fn sign_in<S: UserStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    JsonOrForm(form): JsonOrForm<SignInForm>,
) -> Result<Response, AppError> {
    process_sign_in(&state, &headers, form, None).await
}

/// POST /sign-in/{*next}: sign in, then send the user on to `/{next}`
pub async fn sign_in_then<S: UserStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(next): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    JsonOrForm(form): JsonOrForm<SignInForm>,
) -> Result<Response, AppError> {
    let target = local_path(&next, query.as_deref());
    process_sign_in(&state, &headers, form, target).await
}

async fn process_sign_in<S: UserStore + Clone + 'static>(
    state: &AppState<S>,
    headers: &HeaderMap,
    form: SignInForm,
    target: Option<String>,
) -> Result<Response, AppError> {
    let user = match state.credentials.verify(&form.username, &form.password).await? {
        CredentialCheck::Match(user) => user,
        CredentialCheck::NoMatch => {
            counter!(keys::SIGN_IN_FAILED).increment(1);
            return Err(AppError::CredentialsNotRecognised);
        },
        CredentialCheck::VerifierError(reason) => {
            counter!(keys::SIGN_IN_FAILED).increment(1);
            return Err(AppError::Verifier(reason));
        },
    };

    let payload = user.auth_payload();
    let mut ctx = state.sessions.context(headers);
    state.sessions.start(&mut ctx, user.id.to_string(), payload.clone())?;
    info!(email = %user.email, role = %user.role, "signed in");

    let redirect = target.unwrap_or_else(|| user.role.home().to_string());
    if wants_json(headers) {
        let body = SignedIn {
            redirect,
            auth: payload,
        };
        return Ok((ctx.jar, Json(body)).into_response());
    }
    Ok((ctx.jar, Redirect::to(&redirect)).into_response())
}

/// On-site path for `next` (leading slashes stripped), with `query` re-attached
fn local_path(next: &str, query: Option<&str>) -> Option<String> {
    let path = next.trim_start_matches(['/', '\\']);
    if path.is_empty() {
        return None;
    }
    Some(match query {
        Some(query) if !query.is_empty() => format!("/{path}?{query}"),
        _ => format!("/{path}"),
    })
}

/// POST /sign-out
pub async fn sign_out<S: UserStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
) -> Response {
    let mut ctx = state.sessions.context::<AuthPayload>(&headers);
    state.sessions.cancel(&mut ctx);
    if wants_json(&headers) {
        return (ctx.jar, Json(Ack::new("Signed out"))).into_response();
    }
    (ctx.jar, Redirect::to("/sign-in")).into_response()
}

/// GET /session (signed-in only)
pub async fn session(Extension(AuthState(auth)): Extension<AuthState>) -> Result<Json<SessionInfo>, AppError> {
    let auth = auth.ok_or(AppError::Unauthenticated)?;
    Ok(Json(SessionInfo { auth }))
}

/// GET /profile (signed-in only)
pub async fn profile<S: UserStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Extension(AuthState(auth)): Extension<AuthState>,
) -> Result<Json<Profile>, AppError> {
    let auth = auth.ok_or(AppError::Unauthenticated)?;
    let user = state
        .store
        .find_by_id(auth.user.userid)
        .await
        .map_err(AppError::Store)?
        .ok_or(AppError::Unauthenticated)?;
    Ok(Json(user.profile()))
}

/// POST /profile (signed-in only)
///
/// The session payload carries the e-mail address, so changing it re-issues
/// the session token.
pub async fn update_profile<S: UserStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Extension(AuthState(auth)): Extension<AuthState>,
    headers: HeaderMap,
    JsonOrForm(form): JsonOrForm<ProfileForm>,
) -> Result<Response, AppError> {
    let auth = auth.ok_or(AppError::Unauthenticated)?;
    let update = ProfileUpdate {
        firstname: form.firstname.trim().to_string(),
        lastname: form.lastname.trim().to_string(),
        email: normalise_email(&form.username)?,
    };

    let user = match state
        .store
        .update_profile(auth.user.userid, &update)
        .await
        .map_err(AppError::Store)?
    {
        EmailClaim::Done(user) => user,
        EmailClaim::Taken => return Err(AppError::EmailTaken),
        EmailClaim::NotFound => return Err(AppError::Unauthenticated),
    };
    counter!(keys::PROFILE_UPDATED).increment(1);
    info!(userid = %user.id, email = %user.email, "profile updated");

    let mut ctx = state.sessions.context::<AuthPayload>(&headers);
    if user.email != auth.user.username {
        state.sessions.start(&mut ctx, user.id.to_string(), user.auth_payload())?;
    }

    if wants_json(&headers) {
        return Ok((ctx.jar, Json(user.profile())).into_response());
    }
    Ok((ctx.jar, Redirect::to("/profile")).into_response())
}
