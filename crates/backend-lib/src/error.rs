// crates/backend-lib/src/error.rs

//! Central error type + Axum integration.
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::auth::token::TokenError;
use crate::pages::{message_page, sign_in_page};

/// Application error types with error codes and context
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or invalid deployment configuration; fatal at startup
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid session token: invalid signature")]
    InvalidSignature,

    #[error("Invalid session token: {0}")]
    MalformedToken(String),

    #[error("Session expired: please sign in again")]
    SessionExpired,

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Username / password not recognised")]
    CredentialsNotRecognised,

    /// The password hash engine faulted for a reason other than a mismatch
    #[error("Credential verifier error: {0}")]
    Verifier(String),

    #[error("Bad or expired password reset token")]
    BadResetToken,

    #[error("That e-mail address is already registered")]
    EmailTaken,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Store error: {0}")]
    Store(#[source] anyhow::Error),

    #[error("Mail error: {0}")]
    Mail(#[source] anyhow::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Error details attached to every error response so the content-negotiation
/// layer can re-render it for HTML clients.
#[derive(Debug, Clone)]
pub struct RenderedError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidSignature
            | AppError::MalformedToken(_)
            | AppError::SessionExpired
            | AppError::Unauthenticated
            | AppError::CredentialsNotRecognised
            | AppError::Verifier(_) => StatusCode::UNAUTHORIZED,
            AppError::BadResetToken | AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::EmailTaken => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "CFG_001",
            AppError::InvalidSignature => "AUTH_001",
            AppError::MalformedToken(_) => "AUTH_002",
            AppError::SessionExpired => "AUTH_003",
            AppError::Unauthenticated => "AUTH_004",
            // verifier faults must look exactly like a bad password from outside
            AppError::CredentialsNotRecognised | AppError::Verifier(_) => "AUTH_005",
            AppError::BadResetToken => "RESET_001",
            AppError::EmailTaken => "REG_001",
            AppError::InvalidInput(_) => "VAL_001",
            AppError::Store(_) => "STORE_001",
            AppError::Mail(_) => "MAIL_001",
            AppError::Internal(_) => "INT_001",
            AppError::Io(_) => "IO_001",
            AppError::Json(_) => "JSON_001",
        }
    }

    /// Get a sanitized message suitable for production use
    pub fn sanitized_message(&self) -> String {
        match self {
            AppError::InvalidSignature
            | AppError::MalformedToken(_)
            | AppError::Unauthenticated => "Please sign in again".to_string(),
            AppError::SessionExpired => "Session expired: please sign in again".to_string(),
            AppError::CredentialsNotRecognised | AppError::Verifier(_) => {
                "Username / password not recognised".to_string()
            },
            AppError::BadResetToken => "Bad or expired password reset token".to_string(),
            AppError::EmailTaken => "That e-mail address is already registered".to_string(),
            AppError::InvalidInput(msg) => msg.clone(),
            AppError::Json(_) => "Invalid request format".to_string(),
            AppError::Config(_)
            | AppError::Store(_)
            | AppError::Mail(_)
            | AppError::Internal(_)
            | AppError::Io(_) => "An internal server error occurred".to_string(),
        }
    }

    /// Message shown to the client: detailed in development, sanitized in production.
    /// Verifier faults are always sanitized.
    pub fn public_message(&self) -> String {
        if cfg!(debug_assertions) && !matches!(self, AppError::Verifier(_)) {
            self.to_string()
        } else {
            self.sanitized_message()
        }
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::InvalidSignature => AppError::InvalidSignature,
            TokenError::Expired { .. } | TokenError::MaxAgeExceeded => AppError::SessionExpired,
            TokenError::Format
            | TokenError::Base64
            | TokenError::Json(_)
            | TokenError::UnsupportedAlg(_) => AppError::MalformedToken(err.to_string()),
            TokenError::Key => AppError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.public_message();

        if status.is_server_error() {
            tracing::error!(code = error_code, error = %self, "request failed");
        }

        // Create a JSON response with error details
        let body = serde_json::json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        });

        let mut response = (status, axum::Json(body)).into_response();
        response.extensions_mut().insert(RenderedError {
            status,
            code: error_code,
            message,
        });
        response
    }
}

impl RenderedError {
    /// Render as a minimal HTML page, or a redirect to sign-in for 401s.
    ///
    /// `original` supplies the headers (notably `Set-Cookie`) to carry over.
    /// `path` is the request path and query, appended to the sign-in URL so the
    /// user lands back where they were. A 401 on a sign-in path is a failed
    /// sign-in: the form is shown again with the message.
    pub fn into_html(self, original: Response, path: &str) -> Response {
        let (mut parts, _) = original.into_parts();
        parts.headers.remove(header::CONTENT_TYPE);
        parts.headers.remove(header::CONTENT_LENGTH);

        let on_sign_in = path == "/sign-in" || path.starts_with("/sign-in/") || path.starts_with("/sign-in?");
        if self.status == StatusCode::UNAUTHORIZED && !on_sign_in {
            parts.status = StatusCode::SEE_OTHER;
            let location = format!("/sign-in{path}");
            if let Ok(value) = HeaderValue::from_str(&location) {
                parts.headers.insert(header::LOCATION, value);
            }
            return Response::from_parts(parts, axum::body::Body::empty());
        }

        parts.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        );
        let body = if self.status == StatusCode::UNAUTHORIZED {
            sign_in_page(path, None, Some(&self.message))
        } else {
            message_page(&self.status.to_string(), &self.message)
        };
        Response::from_parts(parts, axum::body::Body::from(body))
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Internal(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Internal(msg.to_string())
    }
}
