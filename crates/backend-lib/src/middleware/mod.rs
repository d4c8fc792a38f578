// crates/backend-lib/src/middleware/mod.rs

//! Middleware for the `sessionkeep` server.

pub mod negotiate;
pub mod session;

pub use negotiate::{negotiate_errors, prefers_json};
pub use session::{authenticate, require_auth, AuthState};
