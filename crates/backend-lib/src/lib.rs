// ============================
// crates/backend-lib/src/lib.rs
// ============================
//! Core of the `sessionkeep` server: cookie-held bearer sessions with silent
//! renewal, credential verification and password reset, plus the registration
//! and profile pages built on them.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod mail;
pub mod metrics;
pub mod middleware;
pub mod pages;
pub mod router;
pub mod store;

use std::sync::Arc;

use crate::auth::{CredentialVerifier, PasswordResetService, SessionManager, StoreRenewalApproval};
use crate::config::Settings;
use crate::error::AppError;
use crate::mail::Mailer;
use crate::store::UserStore;

pub use router::create_router;

/// Application state shared across all handlers
pub struct AppState<S> {
    /// Session token manager
    pub sessions: Arc<SessionManager>,
    /// Sign-in credential checks
    pub credentials: Arc<CredentialVerifier<S>>,
    /// Password reset workflow
    pub resets: Arc<PasswordResetService<S>>,
    /// Identity store
    pub store: S,
    /// Outbound mail (registration notices)
    pub mailer: Arc<dyn Mailer>,
    pub settings: Arc<Settings>,
}

impl<S: UserStore + Clone + 'static> AppState<S> {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] when the settings are unusable, notably a
    /// missing session cookie name or secret key.
    pub fn new(store: S, settings: Settings, mailer: Arc<dyn Mailer>) -> Result<Self, AppError> {
        settings.validate()?;

        let mut sessions = SessionManager::new(settings.session_settings())?;
        if settings.session.renewal_approval {
            sessions = sessions.with_renewal_approval(Arc::new(StoreRenewalApproval::new(store.clone())));
        }
        let credentials = CredentialVerifier::new(store.clone(), &settings.password.cost())?;
        let resets = PasswordResetService::new(store.clone(), mailer.clone(), settings.reset_settings());

        Ok(Self {
            sessions: Arc::new(sessions),
            credentials: Arc::new(credentials),
            resets: Arc::new(resets),
            store,
            mailer,
            settings: Arc::new(settings),
        })
    }
}
