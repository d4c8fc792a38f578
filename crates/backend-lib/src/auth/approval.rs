// ============================
// crates/backend-lib/src/auth/approval.rs
// ============================
//! Store-backed renewal approval.
use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use super::session::RenewalApproval;
use crate::store::UserStore;

/// Refuses renewal when the identity is gone or has `cancel_renewal` set.
pub struct StoreRenewalApproval<S> {
    store: S,
}

impl<S> StoreRenewalApproval<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: UserStore> RenewalApproval for StoreRenewalApproval<S> {
    async fn approve(&self, subject: &str) -> anyhow::Result<bool> {
        let Ok(id) = Uuid::parse_str(subject) else {
            debug!(%subject, "renewal subject is not a user id");
            return Ok(false);
        };
        let approved = match self.store.find_by_id(id).await? {
            Some(user) => !user.cancel_renewal,
            None => false,
        };
        Ok(approved)
    }
}
