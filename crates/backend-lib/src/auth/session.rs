// ============================
// crates/backend-lib/src/auth/session.rs
// ============================
//! Bearer-token sessions with silent renewal.
//!
//! A signed-in user holds a short-lived JWT (`token_lifetime`, e.g. 1 hour) in
//! a signed cookie that lives for `inactivity_limit` (e.g. 30 days). A token
//! that has expired but is otherwise valid and younger than the inactivity
//! limit is replaced by a fresh one, so an active user stays signed in while
//! a stolen token is only good for one lifetime. Tokens cannot be revoked;
//! the optional [`RenewalApproval`] hook is the only way to stop renewal.
use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use axum::http::HeaderMap;
use axum_extra::extract::cookie::{Cookie, Key, SameSite, SignedCookieJar};
use metrics::counter;
use serde::{de::DeserializeOwned, Serialize};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use super::token::{self, unix_now, SessionClaims, TokenError, Validation};
use crate::error::AppError;
use crate::metrics as keys;

/// Default token lifetime (1 hour)
pub const TOKEN_LIFETIME: Duration = Duration::from_secs(60 * 60);

/// Default inactivity limit after which tokens are no longer renewed (30 days)
pub const INACTIVITY_LIMIT: Duration = Duration::from_secs(60 * 60 * 24 * 30);

/// Longest inactivity limit accepted (10 years)
pub const MAX_INACTIVITY_LIMIT: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 10);

const MIN_SECRET_LEN: usize = 32;

/// Signing and timing configuration for the session manager
#[derive(Clone)]
pub struct SessionSettings {
    pub cookie_name: String,
    pub secret_key: String,
    pub token_lifetime: Duration,
    pub inactivity_limit: Duration,
}

impl SessionSettings {
    pub fn new(cookie_name: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            secret_key: secret_key.into(),
            token_lifetime: TOKEN_LIFETIME,
            inactivity_limit: INACTIVITY_LIMIT,
        }
    }

    /// Reject configurations the manager cannot run with
    pub fn validate(&self) -> Result<(), AppError> {
        if self.cookie_name.trim().is_empty() {
            return Err(AppError::Config("no session cookie name set".to_string()));
        }
        if self.secret_key.is_empty() {
            return Err(AppError::Config("no session secret key set".to_string()));
        }
        if self.secret_key.len() < MIN_SECRET_LEN {
            return Err(AppError::Config(format!(
                "session secret key must be at least {MIN_SECRET_LEN} bytes"
            )));
        }
        if self.token_lifetime.is_zero() {
            return Err(AppError::Config("token lifetime must be positive".to_string()));
        }
        if self.inactivity_limit <= self.token_lifetime {
            return Err(AppError::Config(
                "inactivity limit must be longer than the token lifetime".to_string(),
            ));
        }
        if self.inactivity_limit > MAX_INACTIVITY_LIMIT {
            return Err(AppError::Config(format!(
                "inactivity limit must not exceed {} days",
                MAX_INACTIVITY_LIMIT.as_secs() / 86_400
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for SessionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSettings")
            .field("cookie_name", &self.cookie_name)
            .field("secret_key", &"<redacted>")
            .field("token_lifetime", &self.token_lifetime)
            .field("inactivity_limit", &self.inactivity_limit)
            .finish()
    }
}

/// Decides whether an expired session may be renewed for `subject`.
///
/// Consulted only when renewing, never at sign-in or for a still-valid token.
/// Refusing does not invalidate the current token; it only blocks the next renewal.
#[async_trait]
pub trait RenewalApproval: Send + Sync {
    async fn approve(&self, subject: &str) -> anyhow::Result<bool>;
}

/// Per-request session context: the cookie jar and the authenticated-state slot
#[derive(Clone)]
pub struct SessionContext<P> {
    pub jar: SignedCookieJar,
    /// Payload of a verified session; `None` means anonymous
    pub auth: Option<P>,
}

impl<P> SessionContext<P> {
    pub fn new(jar: SignedCookieJar) -> Self {
        Self { jar, auth: None }
    }

    pub fn into_parts(self) -> (SignedCookieJar, Option<P>) {
        (self.jar, self.auth)
    }

    fn cookie_value(&self, name: &str) -> Option<String> {
        self.jar.get(name).map(|c| c.value().to_string())
    }

    fn set_cookie(&mut self, cookie: Cookie<'static>) {
        self.jar = self.jar.clone().add(cookie);
    }

    fn remove_cookie(&mut self, cookie: Cookie<'static>) {
        self.jar = self.jar.clone().remove(cookie);
    }
}

/// Issues, verifies, renews and cancels session tokens
#[derive(Clone)]
pub struct SessionManager {
    cookie_name: String,
    secret: Arc<[u8]>,
    cookie_key: Key,
    token_lifetime: Duration,
    inactivity_limit: Duration,
    approval: Option<Arc<dyn RenewalApproval>>,
}

impl SessionManager {
    /// Create a session manager.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] if the cookie name or secret key is missing
    /// or the timing constants are inconsistent.
    pub fn new(settings: SessionSettings) -> Result<Self, AppError> {
        settings.validate()?;
        Ok(Self {
            cookie_key: Key::derive_from(settings.secret_key.as_bytes()),
            secret: Arc::from(settings.secret_key.into_bytes()),
            cookie_name: settings.cookie_name,
            token_lifetime: settings.token_lifetime,
            inactivity_limit: settings.inactivity_limit,
            approval: None,
        })
    }

    /// Install the renewal approval hook
    #[must_use]
    pub fn with_renewal_approval(mut self, approval: Arc<dyn RenewalApproval>) -> Self {
        self.approval = Some(approval);
        self
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Key used to sign the session cookie
    pub fn cookie_key(&self) -> &Key {
        &self.cookie_key
    }

    /// Session context for a request, reading the cookie from `headers`
    pub fn context<P>(&self, headers: &HeaderMap) -> SessionContext<P> {
        SessionContext::new(SignedCookieJar::from_headers(headers, self.cookie_key.clone()))
    }

    pub fn token_lifetime(&self) -> Duration {
        self.token_lifetime
    }

    pub fn inactivity_limit(&self) -> Duration {
        self.inactivity_limit
    }

    /// Start a session for `subject`: record `payload` in a fresh token, store
    /// the token in the session cookie and publish the payload.
    ///
    /// To be invoked every time a user signs in with their credentials.
    pub fn start<P: Serialize>(
        &self,
        ctx: &mut SessionContext<P>,
        subject: impl Into<String>,
        payload: P,
    ) -> Result<(), AppError> {
        let claims = SessionClaims::new(subject.into(), payload, unix_now(), self.token_lifetime);
        let token = token::encode(&claims, &self.secret)?;
        debug!(subject = %claims.sub, "session started (explicit sign-in)");

        ctx.set_cookie(self.session_cookie(token));
        ctx.auth = Some(claims.data);
        counter!(keys::SESSION_STARTED).increment(1);
        Ok(())
    }

    /// Verify the session token held in the request's cookie.
    ///
    /// Returns `Ok(true)` with the payload published in `ctx.auth` when the
    /// token is valid, or when it has expired within the inactivity limit and
    /// renewal is approved (the cookie then carries a fresh token). Returns
    /// `Ok(false)` when there is no cookie or renewal is refused. Any other
    /// failure removes the cookie and returns an authentication error.
    pub async fn verify<P>(&self, ctx: &mut SessionContext<P>) -> Result<bool, AppError>
    where
        P: Serialize + DeserializeOwned + Send,
    {
        ctx.auth = None;

        // no cookie: either new to the site, or the cookie has expired
        let Some(token) = ctx.cookie_value(&self.cookie_name) else {
            return Ok(false);
        };
        let now = unix_now();

        match token::decode::<P>(&token, &self.secret, now, Validation::Strict) {
            Ok(claims) => {
                debug!(subject = %claims.sub, "session verified");
                ctx.auth = Some(claims.data);
                return Ok(true);
            },
            Err(TokenError::Expired { expired_at }) => {
                debug!(expired_at, "session token expired, attempting renewal");
            },
            Err(err) => return Err(self.reject(ctx, err)),
        }

        let validation = Validation::Renewal {
            max_age: self.inactivity_limit,
        };
        let claims = match token::decode::<P>(&token, &self.secret, now, validation) {
            Ok(claims) => claims,
            Err(err) => return Err(self.reject(ctx, err)),
        };
        let (subject, payload) = claims.into_parts();

        if let Some(approval) = &self.approval {
            let approved = approval
                .approve(&subject)
                .await
                .map_err(|e| AppError::Internal(format!("renewal approval failed: {e:#}")))?;
            if !approved {
                // leave the cookie: a later approval within the window can still renew
                info!(%subject, "session renewal refused");
                counter!(keys::SESSION_RENEWAL_DENIED).increment(1);
                return Ok(false);
            }
        }

        let renewed = SessionClaims::new(subject, payload, now, self.token_lifetime);
        let token = match token::encode(&renewed, &self.secret) {
            Ok(token) => token,
            Err(err) => return Err(self.reject(ctx, err)),
        };
        debug!(subject = %renewed.sub, exp = renewed.exp, "session renewed");

        ctx.set_cookie(self.session_cookie(token));
        ctx.auth = Some(renewed.data);
        counter!(keys::SESSION_RENEWED).increment(1);
        Ok(true)
    }

    /// Sign out: clear the authenticated state and delete the session cookie.
    ///
    /// The token itself stays cryptographically valid until it expires.
    pub fn cancel<P>(&self, ctx: &mut SessionContext<P>) {
        ctx.auth = None;
        ctx.remove_cookie(self.removal_cookie());
        counter!(keys::SESSION_CANCELLED).increment(1);
    }

    fn reject<P>(&self, ctx: &mut SessionContext<P>, err: TokenError) -> AppError {
        warn!(error = %err, "session token rejected");
        ctx.auth = None;
        ctx.remove_cookie(self.removal_cookie());
        counter!(keys::SESSION_REJECTED).increment(1);
        AppError::from(err)
    }

    // httpOnly is off: client-side code may read the token as well
    fn session_cookie(&self, token: String) -> Cookie<'static> {
        let cookie = Cookie::build((self.cookie_name.clone(), token))
            .http_only(false)
            .same_site(SameSite::Strict)
            .path("/");
        let expires = time::Duration::try_from(self.inactivity_limit)
            .ok()
            .and_then(|limit| OffsetDateTime::now_utc().checked_add(limit));
        match expires {
            Some(expires) => cookie.expires(expires).build(),
            None => cookie.build(),
        }
    }

    fn removal_cookie(&self) -> Cookie<'static> {
        Cookie::build((self.cookie_name.clone(), "")).path("/").build()
    }
}
