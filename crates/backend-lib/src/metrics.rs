// ==============
// crates/backend-lib/src/metrics.rs

//! Central place for metric keys
pub const SESSION_STARTED: &str = "session.started";
pub const SESSION_RENEWED: &str = "session.renewed";
pub const SESSION_RENEWAL_DENIED: &str = "session.renewal_denied";
pub const SESSION_REJECTED: &str = "session.rejected";
pub const SESSION_CANCELLED: &str = "session.cancelled";
pub const SIGN_IN_FAILED: &str = "sign_in.failed";
pub const RESET_REQUESTED: &str = "reset.requested";
pub const RESET_COMPLETED: &str = "reset.completed";
pub const RESET_REJECTED: &str = "reset.rejected";
pub const REGISTERED: &str = "register.created";
pub const PROFILE_UPDATED: &str = "profile.updated";
