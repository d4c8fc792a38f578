// ================
// common/src/lib.rs
// ================
//! Common types and structures
//! exchanged between the `sessionkeep` server and its clients.
//! This module defines the sign-in, registration, profile and password-reset
//! bodies and the authentication payload carried inside session tokens.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Authorization role of an identity
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full access to the admin area
    Admin,
    /// Regular signed-in user
    #[default]
    User,
}

impl Role {
    /// Landing page after a successful sign-in
    pub fn home(self) -> &'static str {
        match self {
            Role::Admin => "/admin",
            Role::User => "/",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => f.write_str("admin"),
            Role::User => f.write_str("user"),
        }
    }
}

/// Identity details recorded at sign-in so handlers don't need a store lookup
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    /// Identity reference
    pub userid: Uuid,
    /// Sign-in name (e-mail address)
    pub username: String,
    /// Authorization role
    pub role: Role,
}

/// Payload recorded in the session token and echoed into the authenticated state
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AuthPayload {
    /// The signed-in user
    pub user: AuthUser,
}

/// Sign-in request body
/// # Fields
/// * `username` - E-mail address the identity is registered under
/// * `password` - Submitted secret
#[derive(Serialize, Deserialize, Clone)]
pub struct SignInForm {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for SignInForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignInForm")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Successful sign-in response
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SignedIn {
    /// Where the client should go next
    pub redirect: String,
    /// Payload now held in the session
    pub auth: AuthPayload,
}

/// Current session response
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SessionInfo {
    /// Payload of the verified (possibly renewed) session
    pub auth: AuthPayload,
}

/// Password reset request body
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ResetRequestForm {
    /// E-mail address to send the reset link to
    pub username: String,
}

/// Password reset body, posted to `/password/reset/{token}`
#[derive(Serialize, Deserialize, Clone)]
pub struct ResetForm {
    pub password: String,
    #[serde(rename = "passwordConfirm")]
    pub password_confirm: String,
}

impl fmt::Debug for ResetForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ResetForm { .. }")
    }
}

/// Registration request body.
///
/// There is no password: a new identity chooses one through the password
/// reset workflow.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RegisterForm {
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
    /// E-mail address to register
    pub username: String,
}

/// Successful registration response
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Registered {
    pub userid: Uuid,
    /// Where the new user goes to choose a password
    pub redirect: String,
}

/// Profile update body
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ProfileForm {
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
    pub username: String,
}

/// Profile of the signed-in identity
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub userid: Uuid,
    pub firstname: String,
    pub lastname: String,
    pub username: String,
    pub role: Role,
}

/// Generic acknowledgement returned by the password reset endpoints
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub message: String,
}

impl Ack {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
