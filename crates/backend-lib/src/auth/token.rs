// ============================
// crates/backend-lib/src/auth/token.rs
// ============================
//! HS256 JSON Web Tokens carrying the session claim.
//!
//! Tokens are compact JWS strings: `header.claims.signature`, each part
//! base64url without padding. The signature is checked before the claims are
//! parsed.
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::Sha256;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const ALG: &str = "HS256";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct TokenHeader {
    alg: String,
    #[serde(default)]
    typ: String,
}

impl TokenHeader {
    fn hs256() -> Self {
        Self {
            alg: ALG.to_string(),
            typ: "JWT".to_string(),
        }
    }
}

/// Session claim: subject and payload plus the standard timing fields
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims<P> {
    /// Subject (identity reference)
    pub sub: String,
    /// Associated data echoed back on every successful verification
    pub data: P,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expires at (unix seconds)
    pub exp: i64,
}

impl<P> SessionClaims<P> {
    /// Build a claim issued at `now`, valid for `lifetime`
    pub fn new(sub: String, data: P, now: i64, lifetime: Duration) -> Self {
        Self {
            sub,
            data,
            iat: now,
            exp: now.saturating_add(secs(lifetime)),
        }
    }

    /// Strip the timing fields, leaving subject and payload
    pub fn into_parts(self) -> (String, P) {
        (self.sub, self.data)
    }
}

/// How strictly `decode` treats the timing fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    /// Signature must verify and `exp` must be in the future
    Strict,
    /// Signature must verify; `exp` is ignored but the token must be younger than `max_age`
    Renewal { max_age: Duration },
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token format")]
    Format,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired at {expired_at}")]
    Expired { expired_at: i64 },
    #[error("maximum token age exceeded")]
    MaxAgeExceeded,
    #[error("unusable signing key")]
    Key,
}

/// Current time in unix seconds
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

pub(crate) fn secs(duration: Duration) -> i64 {
    i64::try_from(duration.as_secs()).unwrap_or(i64::MAX)
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, TokenError> {
    let json = serde_json::to_vec(value)?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

fn b64d_json<T: DeserializeOwned>(s: &str) -> Result<T, TokenError> {
    let bytes = URL_SAFE_NO_PAD.decode(s).map_err(|_| TokenError::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn mac(secret: &[u8]) -> Result<HmacSha256, TokenError> {
    HmacSha256::new_from_slice(secret).map_err(|_| TokenError::Key)
}

/// Sign `claims` with `secret` (HMAC-SHA256).
///
/// # Errors
///
/// Returns an error if the claims cannot be serialised.
pub fn encode<P: Serialize>(claims: &SessionClaims<P>, secret: &[u8]) -> Result<String, TokenError> {
    let header_b64 = b64e_json(&TokenHeader::hs256())?;
    let claims_b64 = b64e_json(claims)?;
    let signing_input = format!("{header_b64}.{claims_b64}");

    let mut mac = mac(secret)?;
    mac.update(signing_input.as_bytes());
    let signature_b64 = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{signing_input}.{signature_b64}"))
}

/// Verify `token` against `secret` and return its claims.
///
/// # Errors
///
/// Returns an error if the token is malformed, the signature does not verify,
/// or the timing fields fail `validation`.
pub fn decode<P: DeserializeOwned>(
    token: &str,
    secret: &[u8],
    now: i64,
    validation: Validation,
) -> Result<SessionClaims<P>, TokenError> {
    let mut parts = token.split('.');
    let header_b64 = parts.next().ok_or(TokenError::Format)?;
    let claims_b64 = parts.next().ok_or(TokenError::Format)?;
    let sig_b64 = parts.next().ok_or(TokenError::Format)?;
    if parts.next().is_some() || header_b64.is_empty() || claims_b64.is_empty() {
        return Err(TokenError::Format);
    }

    let header: TokenHeader = b64d_json(header_b64)?;
    if header.alg != ALG {
        return Err(TokenError::UnsupportedAlg(header.alg));
    }

    let signature = URL_SAFE_NO_PAD
        .decode(sig_b64)
        .map_err(|_| TokenError::Base64)?;
    let mut mac = mac(secret)?;
    mac.update(header_b64.as_bytes());
    mac.update(b".");
    mac.update(claims_b64.as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| TokenError::InvalidSignature)?;

    let claims: SessionClaims<P> = b64d_json(claims_b64)?;
    match validation {
        Validation::Strict => {
            if claims.exp <= now {
                return Err(TokenError::Expired {
                    expired_at: claims.exp,
                });
            }
        },
        Validation::Renewal { max_age } => {
            // a token exactly `max_age` old is already too old
            if now.saturating_sub(claims.iat) >= secs(max_age) {
                return Err(TokenError::MaxAgeExceeded);
            }
        },
    }

    Ok(claims)
}
