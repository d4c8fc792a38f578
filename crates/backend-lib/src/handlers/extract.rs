// ============================
// crates/backend-lib/src/handlers/extract.rs
// ============================
//! Request body extraction shared by the form-driven endpoints.
use axum::{
    extract::{FromRequest, Request},
    http::{header, HeaderMap},
    Form, Json,
};
use serde::de::DeserializeOwned;

use crate::error::AppError;
use crate::middleware::prefers_json;

/// Body read as a urlencoded form when the request says so, as JSON otherwise.
///
/// Browsers post forms; scripts post JSON. A body that fails to parse is
/// [`AppError::InvalidInput`].
#[derive(Debug, Clone)]
pub struct JsonOrForm<T>(pub T);

impl<S, T> FromRequest<S> for JsonOrForm<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send + 'static,
{
    type Rejection = AppError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        if is_form(request.headers()) {
            let Form(value) = Form::<T>::from_request(request, state)
                .await
                .map_err(|e| AppError::InvalidInput(e.body_text()))?;
            Ok(Self(value))
        } else {
            let Json(value) = Json::<T>::from_request(request, state)
                .await
                .map_err(|e| AppError::InvalidInput(e.body_text()))?;
            Ok(Self(value))
        }
    }
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.trim_start().starts_with("application/x-www-form-urlencoded"))
}

/// Whether the client asked for JSON rather than a page or redirect
pub fn wants_json(headers: &HeaderMap) -> bool {
    prefers_json(headers.get(header::ACCEPT).and_then(|v| v.to_str().ok()))
}
