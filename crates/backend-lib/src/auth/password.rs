// ============================
// crates/backend-lib/src/auth/password.rs
// ============================
//! Password hashing and credential verification.
use scrypt::{
    password_hash::{Error as HashError, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Params, Scrypt,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};
use zeroize::{Zeroize, Zeroizing};

use crate::error::AppError;
use crate::store::{User, UserStore};

/// Minimum password length
pub const MIN_PASSWORD_LENGTH: usize = 10;

/// Stand-in hash verified when the identity does not exist, so that an unknown
/// identity costs the same as a wrong password. Same algorithm and cost as
/// `ScryptCost::default()`.
pub const DUMMY_PASSWORD_HASH: &str =
    "$scrypt$ln=15,r=8,p=1$AAECAwQFBgcICQoLDA0ODw$VZTPOmunPy4k8QCNvBkSpHLZamePvETUTrrJ4gDW5jM";

const DUMMY_SECRET: &str = "sessionkeep-dummy-credential";
const SALT_LEN: usize = 16;
const OUTPUT_LEN: usize = 32;

/// scrypt cost parameters used for newly stored hashes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScryptCost {
    pub log_n: u8,
    pub r: u32,
    pub p: u32,
}

impl Default for ScryptCost {
    fn default() -> Self {
        Self {
            log_n: 15,
            r: 8,
            p: 1,
        }
    }
}

impl ScryptCost {
    pub(crate) fn params(&self) -> Result<Params, AppError> {
        Params::new(self.log_n, self.r, self.p, OUTPUT_LEN)
            .map_err(|e| AppError::Config(format!("invalid scrypt parameters: {e}")))
    }
}

/// Password complexity requirements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordRequirements {
    pub min_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_digit: bool,
    pub require_special: bool,
}

impl Default for PasswordRequirements {
    fn default() -> Self {
        Self {
            min_length: MIN_PASSWORD_LENGTH,
            require_uppercase: true,
            require_lowercase: true,
            require_digit: true,
            require_special: true,
        }
    }
}

/// Hash a password using scrypt, returning a PHC string
pub fn hash_password(plain: &str, cost: &ScryptCost) -> Result<String, AppError> {
    let mut salt_bytes = [0u8; SALT_LEN];
    rand::rng().fill(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| AppError::Internal(format!("salt encoding failed: {e}")))?;
    let hash = Scrypt
        .hash_password_customized(plain.as_bytes(), None, None, cost.params()?, &salt)
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))?
        .to_string();
    Ok(hash)
}

/// Hash a password on the blocking pool and zeroize the original
pub async fn hash_password_secure(mut plain: String, cost: ScryptCost) -> Result<String, AppError> {
    let hashed = tokio::task::spawn_blocking(move || {
        let hash = hash_password(&plain, &cost);
        plain.zeroize();
        hash
    })
    .await
    .map_err(|e| AppError::Internal(format!("hashing task failed: {e}")))?;
    hashed
}

/// Outcome of checking a secret against a single stored hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashCheck {
    Match,
    Mismatch,
    /// The stored string is not a usable PHC hash
    Malformed(String),
    /// The hash engine itself failed
    Fault(String),
}

/// Verify a password against a stored PHC hash
pub fn check_password(hash: &str, plain: &[u8]) -> HashCheck {
    let parsed = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(e) => return HashCheck::Malformed(e.to_string()),
    };
    match Scrypt.verify_password(plain, &parsed) {
        Ok(()) => HashCheck::Match,
        Err(HashError::Password) => HashCheck::Mismatch,
        Err(e @ (HashError::B64Encoding(_) | HashError::SaltInvalid(_) | HashError::OutputSize { .. })) => {
            HashCheck::Malformed(e.to_string())
        },
        Err(e) => HashCheck::Fault(e.to_string()),
    }
}

/// Convenience wrapper: true only on an exact match
pub fn verify_password(hash: &str, plain: &str) -> bool {
    check_password(hash, plain.as_bytes()) == HashCheck::Match
}

/// Check if a password meets the complexity requirements
pub fn validate_password_strength(password: &str, requirements: &PasswordRequirements) -> bool {
    if password.chars().count() < requirements.min_length {
        return false;
    }

    if requirements.require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
        return false;
    }

    if requirements.require_lowercase && !password.chars().any(|c| c.is_lowercase()) {
        return false;
    }

    if requirements.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
        return false;
    }

    if requirements.require_special && !password.chars().any(|c| !c.is_alphanumeric()) {
        return false;
    }

    true
}

/// Result of a sign-in credential check.
///
/// Callers must not distinguish an unknown identity from a wrong secret;
/// both are `NoMatch`.
#[derive(Debug, Clone)]
pub enum CredentialCheck {
    Match(User),
    NoMatch,
    VerifierError(String),
}

/// Checks submitted secrets against the identity store
pub struct CredentialVerifier<S> {
    store: S,
    dummy_hash: String,
}

impl<S: UserStore> CredentialVerifier<S> {
    /// Create a verifier whose dummy hash matches the cost of stored hashes.
    ///
    /// The dummy hash is fixed for the lifetime of the verifier.
    pub fn new(store: S, cost: &ScryptCost) -> Result<Self, AppError> {
        let dummy_hash = if *cost == ScryptCost::default() {
            DUMMY_PASSWORD_HASH.to_string()
        } else {
            hash_password(DUMMY_SECRET, cost)?
        };
        Ok(Self { store, dummy_hash })
    }

    /// Verify `secret` for the identity registered under `identity_key`.
    ///
    /// The full hash computation runs whether or not the identity exists.
    pub async fn verify(&self, identity_key: &str, secret: &str) -> Result<CredentialCheck, AppError> {
        let user = self
            .store
            .find_by_email(identity_key)
            .await
            .map_err(AppError::Store)?;

        // identities without a password yet cost the same as unknown ones
        let stored = match &user {
            Some(user) if user.has_password() => user.password_hash.clone(),
            _ => self.dummy_hash.clone(),
        };
        let secret = Zeroizing::new(secret.as_bytes().to_vec());
        let check = tokio::task::spawn_blocking(move || check_password(&stored, &secret))
            .await
            .map_err(|e| AppError::Internal(format!("verification task failed: {e}")))?;

        Ok(match (user, check) {
            (Some(user), HashCheck::Match) if user.has_password() => CredentialCheck::Match(user),
            (_, HashCheck::Fault(reason)) => {
                error!(identity = identity_key, %reason, "credential verifier fault");
                CredentialCheck::VerifierError(reason)
            },
            (_, HashCheck::Malformed(reason)) => {
                warn!(identity = identity_key, %reason, "stored credential hash unusable");
                CredentialCheck::NoMatch
            },
            _ => {
                debug!(identity = identity_key, "credentials not recognised");
                CredentialCheck::NoMatch
            },
        })
    }
}
