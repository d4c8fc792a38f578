// ============================
// crates/backend-lib/src/store.rs
// ============================
//! Identity store abstraction with an in-memory implementation.
use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sessionkeep_common::{AuthPayload, AuthUser, Profile, Role};
use tokio::fs as tokio_fs;
use uuid::Uuid;

use crate::auth::password::{hash_password, ScryptCost};

/// Identity record owned by the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub firstname: String,
    pub lastname: String,
    /// scrypt PHC string
    pub password_hash: String,
    pub role: Role,
    /// At most one outstanding password reset token
    #[serde(default)]
    pub reset_token: Option<String>,
    /// Set to stop this identity's sessions from renewing
    #[serde(default)]
    pub cancel_renewal: bool,
}

impl User {
    pub fn new(
        email: impl Into<String>,
        firstname: impl Into<String>,
        lastname: impl Into<String>,
        password_hash: String,
        role: Role,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            firstname: firstname.into(),
            lastname: lastname.into(),
            password_hash,
            role,
            reset_token: None,
            cancel_renewal: false,
        }
    }

    /// Session payload recorded at sign-in
    pub fn auth_payload(&self) -> AuthPayload {
        AuthPayload {
            user: AuthUser {
                userid: self.id,
                username: self.email.clone(),
                role: self.role,
            },
        }
    }

    pub fn profile(&self) -> Profile {
        Profile {
            userid: self.id,
            firstname: self.firstname.clone(),
            lastname: self.lastname.clone(),
            username: self.email.clone(),
            role: self.role,
        }
    }

    /// Registered without a password and not yet through a reset
    pub fn has_password(&self) -> bool {
        !self.password_hash.is_empty()
    }
}

/// Editable profile fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub firstname: String,
    pub lastname: String,
    pub email: String,
}

/// Outcome of a write that claims an e-mail address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailClaim {
    Done(User),
    /// Another identity already holds the address
    Taken,
    /// No identity with that id
    NotFound,
}

/// Trait for identity store backends
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Look up an identity by e-mail (case-insensitive)
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;

    /// Look up the identity carrying exactly this reset token
    async fn find_by_reset_token(&self, token: &str) -> anyhow::Result<Option<User>>;

    /// Record a reset token, replacing any previous one
    async fn set_reset_token(&self, id: Uuid, token: &str) -> anyhow::Result<()>;

    /// Clear a reset token wherever it is stored
    async fn clear_reset_token(&self, token: &str) -> anyhow::Result<()>;

    /// Set a new password hash and clear the reset token in one step, but only
    /// if `token` is still the identity's outstanding token.
    async fn consume_reset_token(
        &self,
        token: &str,
        password_hash: &str,
    ) -> anyhow::Result<Option<User>>;

    async fn set_cancel_renewal(&self, id: Uuid, cancel: bool) -> anyhow::Result<()>;

    /// Add a new identity unless its e-mail is already registered
    async fn create_user(&self, user: User) -> anyhow::Result<EmailClaim>;

    /// Change names and e-mail of an identity; the e-mail must not belong to another one
    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> anyhow::Result<EmailClaim>;
}

#[async_trait]
impl<T: UserStore + ?Sized> UserStore for Arc<T> {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        (**self).find_by_email(email).await
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        (**self).find_by_id(id).await
    }

    async fn find_by_reset_token(&self, token: &str) -> anyhow::Result<Option<User>> {
        (**self).find_by_reset_token(token).await
    }

    async fn set_reset_token(&self, id: Uuid, token: &str) -> anyhow::Result<()> {
        (**self).set_reset_token(id, token).await
    }

    async fn clear_reset_token(&self, token: &str) -> anyhow::Result<()> {
        (**self).clear_reset_token(token).await
    }

    async fn consume_reset_token(
        &self,
        token: &str,
        password_hash: &str,
    ) -> anyhow::Result<Option<User>> {
        (**self).consume_reset_token(token, password_hash).await
    }

    async fn set_cancel_renewal(&self, id: Uuid, cancel: bool) -> anyhow::Result<()> {
        (**self).set_cancel_renewal(id, cancel).await
    }

    async fn create_user(&self, user: User) -> anyhow::Result<EmailClaim> {
        (**self).create_user(user).await
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> anyhow::Result<EmailClaim> {
        (**self).update_profile(id, update).await
    }
}

/// Seed record with a plain-text password, hashed on load
#[derive(Debug, Clone, Deserialize)]
pub struct SeedUser {
    pub email: String,
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
    pub password: String,
    #[serde(default)]
    pub role: Role,
}

/// In-memory implementation of the `UserStore` trait
#[derive(Clone, Default)]
pub struct InMemoryUserStore {
    users: Arc<DashMap<Uuid, User>>,
    /// Serialises writes that claim an e-mail address
    claims: Arc<Mutex<()>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user: User) {
        self.users.insert(user.id, user);
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Load seed users from a JSON array, hashing their passwords
    pub async fn from_json_file<P: AsRef<Path>>(path: P, cost: &ScryptCost) -> anyhow::Result<Self> {
        let content = tokio_fs::read_to_string(path.as_ref()).await?;
        let seeds: Vec<SeedUser> = serde_json::from_str(&content)?;
        let store = Self::new();
        for seed in seeds {
            let hash = hash_password(&seed.password, cost)?;
            store.insert(User::new(seed.email, seed.firstname, seed.lastname, hash, seed.role));
        }
        Ok(store)
    }

    fn find(&self, pred: impl Fn(&User) -> bool) -> Option<User> {
        self.users
            .iter()
            .find(|entry| pred(entry.value()))
            .map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self.find(|u| u.email.eq_ignore_ascii_case(email)))
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.users.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_by_reset_token(&self, token: &str) -> anyhow::Result<Option<User>> {
        Ok(self.find(|u| u.reset_token.as_deref() == Some(token)))
    }

    async fn set_reset_token(&self, id: Uuid, token: &str) -> anyhow::Result<()> {
        let mut user = self
            .users
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("no user with id {id}"))?;
        user.reset_token = Some(token.to_string());
        Ok(())
    }

    async fn clear_reset_token(&self, token: &str) -> anyhow::Result<()> {
        for mut entry in self.users.iter_mut() {
            if entry.reset_token.as_deref() == Some(token) {
                entry.reset_token = None;
            }
        }
        Ok(())
    }

    async fn consume_reset_token(
        &self,
        token: &str,
        password_hash: &str,
    ) -> anyhow::Result<Option<User>> {
        for mut entry in self.users.iter_mut() {
            if entry.reset_token.as_deref() == Some(token) {
                entry.password_hash = password_hash.to_string();
                entry.reset_token = None;
                return Ok(Some(entry.value().clone()));
            }
        }
        Ok(None)
    }

    async fn set_cancel_renewal(&self, id: Uuid, cancel: bool) -> anyhow::Result<()> {
        let mut user = self
            .users
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("no user with id {id}"))?;
        user.cancel_renewal = cancel;
        Ok(())
    }

    async fn create_user(&self, user: User) -> anyhow::Result<EmailClaim> {
        let _claim = self.claims.lock().map_err(|_| anyhow::anyhow!("e-mail claim lock poisoned"))?;
        if self.find(|u| u.email.eq_ignore_ascii_case(&user.email)).is_some() {
            return Ok(EmailClaim::Taken);
        }
        self.users.insert(user.id, user.clone());
        Ok(EmailClaim::Done(user))
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> anyhow::Result<EmailClaim> {
        let _claim = self.claims.lock().map_err(|_| anyhow::anyhow!("e-mail claim lock poisoned"))?;
        // iterate before taking the entry lock
        if self
            .find(|u| u.id != id && u.email.eq_ignore_ascii_case(&update.email))
            .is_some()
        {
            return Ok(EmailClaim::Taken);
        }
        let Some(mut user) = self.users.get_mut(&id) else {
            return Ok(EmailClaim::NotFound);
        };
        user.firstname = update.firstname.clone();
        user.lastname = update.lastname.clone();
        user.email = update.email.clone();
        Ok(EmailClaim::Done(user.value().clone()))
    }
}
