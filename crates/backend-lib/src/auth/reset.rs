// ============================
// crates/backend-lib/src/auth/reset.rs
// ============================
//! Single-use, time-boxed password reset tokens.
//!
//! A token is `<issued-at in base36 unix seconds>-<8 random base36 chars>`.
//! It is neither signed nor encrypted: only the random suffix makes it hard to
//! guess, and the timestamp prefix lets stale tokens be spotted without a lookup.
//! At most one token is outstanding per identity; it is cleared on use, and
//! cleared lazily when a validation attempt finds it expired.
use std::{collections::HashMap, fmt, sync::Arc, time::Duration};

use metrics::counter;
use rand::Rng;
use tracing::{debug, info};

use super::password::{hash_password_secure, validate_password_strength, PasswordRequirements, ScryptCost};
use super::token::{secs, unix_now};
use crate::error::AppError;
use crate::mail::{Mailer, RESET_EMAIL_TEMPLATE};
use crate::metrics as keys;
use crate::store::{User, UserStore};

/// Default reset token validity window (24 hours)
pub const RESET_TOKEN_TTL: Duration = Duration::from_secs(60 * 60 * 24);

// 36^8 is about 2^41.4 possible suffixes per outstanding token
const RANDOM_LEN: usize = 8;
const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE36[(n % 36) as usize]);
        n /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

/// Opaque reset token as delivered to the user
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResetToken(String);

impl ResetToken {
    /// Mint a token issued at `now` (unix seconds)
    pub fn generate(now: i64) -> Self {
        let mut rng = rand::rng();
        let random: String = (0..RANDOM_LEN)
            .map(|_| char::from(BASE36[rng.random_range(0..BASE36.len())]))
            .collect();
        let issued = to_base36(u64::try_from(now).unwrap_or(0));
        Self(format!("{issued}-{random}"))
    }

    /// Issuance time parsed from the prefix; `None` if the prefix is garbled
    pub fn issued_at(&self) -> Option<i64> {
        let (prefix, _) = self.0.split_once('-')?;
        i64::from_str_radix(prefix, 36).ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ResetToken {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl fmt::Display for ResetToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tunables for the reset workflow
#[derive(Debug, Clone)]
pub struct ResetSettings {
    pub token_ttl: Duration,
    pub email_subject: String,
    pub requirements: PasswordRequirements,
    pub cost: ScryptCost,
}

impl Default for ResetSettings {
    fn default() -> Self {
        Self {
            token_ttl: RESET_TOKEN_TTL,
            email_subject: "Password reset".to_string(),
            requirements: PasswordRequirements::default(),
            cost: ScryptCost::default(),
        }
    }
}

/// What `request` did. Never shown to the requester.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetRequestOutcome {
    /// Token stored and mailed
    Sent(ResetToken),
    UnknownIdentity,
}

pub struct PasswordResetService<S> {
    store: S,
    mailer: Arc<dyn Mailer>,
    settings: ResetSettings,
}

impl<S: UserStore> PasswordResetService<S> {
    pub fn new(store: S, mailer: Arc<dyn Mailer>, settings: ResetSettings) -> Self {
        Self {
            store,
            mailer,
            settings,
        }
    }

    /// Issue a reset token for `identity_key` and mail a link under `origin`.
    ///
    /// The token is minted before the lookup so the work done is the same
    /// whether or not the identity exists. A new token replaces any earlier one.
    pub async fn request(&self, identity_key: &str, origin: &str) -> Result<ResetRequestOutcome, AppError> {
        let token = ResetToken::generate(unix_now());
        counter!(keys::RESET_REQUESTED).increment(1);

        let Some(user) = self
            .store
            .find_by_email(identity_key)
            .await
            .map_err(AppError::Store)?
        else {
            debug!(email = identity_key, "reset requested for unknown identity");
            return Ok(ResetRequestOutcome::UnknownIdentity);
        };

        self.store
            .set_reset_token(user.id, token.as_str())
            .await
            .map_err(AppError::Store)?;

        let mut context = HashMap::new();
        context.insert("name", user.firstname.clone());
        context.insert("origin", origin.to_string());
        context.insert("token", token.to_string());
        self.mailer
            .send_templated(&user.email, &self.settings.email_subject, RESET_EMAIL_TEMPLATE, &context)
            .await
            .map_err(AppError::Mail)?;

        info!(email = %user.email, "password reset requested");
        Ok(ResetRequestOutcome::Sent(token))
    }

    /// Identity holding `token`, if the token is outstanding and within its window.
    ///
    /// An expired token is cleared as a side effect.
    pub async fn validate(&self, token: &str) -> Result<Option<User>, AppError> {
        let Some(user) = self
            .store
            .find_by_reset_token(token)
            .await
            .map_err(AppError::Store)?
        else {
            return Ok(None);
        };

        let issued_at = ResetToken::from(token.to_string()).issued_at();
        let expired = match issued_at {
            Some(issued_at) => unix_now().saturating_sub(issued_at) > secs(self.settings.token_ttl),
            None => true,
        };
        if expired {
            self.store
                .clear_reset_token(token)
                .await
                .map_err(AppError::Store)?;
            debug!(email = %user.email, "expired reset token cleared");
            return Ok(None);
        }

        Ok(Some(user))
    }

    /// Set a new password using `token`, which is then spent.
    ///
    /// Unknown, expired and already-used tokens all yield
    /// [`AppError::BadResetToken`]. A password that fails the strength check
    /// leaves the token usable.
    pub async fn consume(&self, token: &str, new_secret: String) -> Result<User, AppError> {
        if self.validate(token).await?.is_none() {
            counter!(keys::RESET_REJECTED).increment(1);
            return Err(AppError::BadResetToken);
        }

        if !validate_password_strength(&new_secret, &self.settings.requirements) {
            return Err(AppError::InvalidInput(format!(
                "Password must be at least {} characters and mix upper and lower case letters, digits and symbols",
                self.settings.requirements.min_length
            )));
        }

        let hash = hash_password_secure(new_secret, self.settings.cost).await?;
        let Some(user) = self
            .store
            .consume_reset_token(token, &hash)
            .await
            .map_err(AppError::Store)?
        else {
            // spent by a concurrent request
            counter!(keys::RESET_REJECTED).increment(1);
            return Err(AppError::BadResetToken);
        };

        counter!(keys::RESET_COMPLETED).increment(1);
        info!(email = %user.email, "password reset");
        Ok(user)
    }
}
