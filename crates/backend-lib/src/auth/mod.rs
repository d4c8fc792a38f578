// ============================
// crates/backend-lib/src/auth/mod.rs
// ============================
//! Authentication module.

pub mod approval;
pub mod password;
pub mod reset;
pub mod session;
pub mod token;

pub use approval::StoreRenewalApproval;
pub use password::{
    hash_password, validate_password_strength, verify_password, CredentialCheck, CredentialVerifier,
    PasswordRequirements, ScryptCost, MIN_PASSWORD_LENGTH,
};
pub use reset::{PasswordResetService, ResetRequestOutcome, ResetSettings, ResetToken, RESET_TOKEN_TTL};
pub use session::{
    RenewalApproval, SessionContext, SessionManager, SessionSettings, INACTIVITY_LIMIT, TOKEN_LIFETIME,
};
