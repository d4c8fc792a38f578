// ============================
// crates/backend-lib/src/router.rs
// ============================
//! HTTP routes.
use std::sync::Arc;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::handlers::{auth, password, register};
use crate::middleware::{authenticate, negotiate_errors, require_auth};
use crate::store::UserStore;
use crate::AppState;

/// Build the application router.
///
/// Every route runs behind session verification; `/session` and `/profile`
/// additionally require a signed-in user.
pub fn create_router<S: UserStore + Clone + 'static>(state: Arc<AppState<S>>) -> Router {
    let protected = Router::new()
        .route("/session", get(auth::session))
        .route("/profile", get(auth::profile::<S>).post(auth::update_profile::<S>))
        .route_layer(from_fn(require_auth));

    Router::new()
        .route("/sign-in", get(auth::sign_in_form).post(auth::sign_in::<S>))
        .route(
            "/sign-in/{*next}",
            get(auth::sign_in_form_then).post(auth::sign_in_then::<S>),
        )
        .route("/sign-out", post(auth::sign_out::<S>))
        .route("/register", post(register::register::<S>))
        .route("/register/available", get(register::register_available::<S>))
        .route(
            "/password/reset-request",
            get(password::reset_request_form).post(password::reset_request::<S>),
        )
        .route(
            "/password/reset/{token}",
            get(password::reset_check::<S>).post(password::reset::<S>),
        )
        .merge(protected)
        .layer(from_fn_with_state(state.clone(), authenticate::<S>))
        .layer(from_fn(negotiate_errors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
