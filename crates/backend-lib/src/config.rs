// ============================
// crates/backend-lib/src/config.rs
// ============================
//! Configuration management.
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::auth::password::{PasswordRequirements, ScryptCost};
use crate::auth::reset::ResetSettings;
use crate::auth::session::SessionSettings;
use crate::error::AppError;

/// Prefix for environment overrides; `__` separates nested keys
pub const ENV_PREFIX: &str = "SESSIONKEEP_";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub session: SessionConfig,
    pub password: PasswordConfig,
    pub reset: ResetConfig,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_addr: SocketAddr,
    /// JSON file of users to seed the in-memory store with
    pub users_file: Option<PathBuf>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            users_file: None,
        }
    }
}

/// Session cookie and token timing. Name and secret have no usable default.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub secret_key: String,
    pub token_lifetime_secs: u64,
    pub inactivity_limit_secs: u64,
    /// Consult the user store before renewing a session
    pub renewal_approval: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: String::new(),
            secret_key: String::new(),
            token_lifetime_secs: 60 * 60,
            inactivity_limit_secs: 60 * 60 * 24 * 30,
            renewal_approval: true,
        }
    }
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("cookie_name", &self.cookie_name)
            .field("secret_key", &"<redacted>")
            .field("token_lifetime_secs", &self.token_lifetime_secs)
            .field("inactivity_limit_secs", &self.inactivity_limit_secs)
            .field("renewal_approval", &self.renewal_approval)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordConfig {
    pub scrypt_log_n: u8,
    pub scrypt_r: u32,
    pub scrypt_p: u32,
    pub requirements: PasswordRequirements,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        let cost = ScryptCost::default();
        Self {
            scrypt_log_n: cost.log_n,
            scrypt_r: cost.r,
            scrypt_p: cost.p,
            requirements: PasswordRequirements::default(),
        }
    }
}

impl PasswordConfig {
    pub fn cost(&self) -> ScryptCost {
        ScryptCost {
            log_n: self.scrypt_log_n,
            r: self.scrypt_r,
            p: self.scrypt_p,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResetConfig {
    pub token_ttl_secs: u64,
    /// Echo issued reset tokens in an `X-Reset-Token` response header (testing only)
    pub expose_token_header: bool,
    pub email_subject: String,
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self {
            token_ttl_secs: 60 * 60 * 24,
            expose_token_header: false,
            email_subject: "Password reset".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
    pub json: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Settings {
    /// Load from `config.toml` in the working directory, then the environment
    pub fn load() -> Result<Self> {
        Self::load_from("config.toml")
    }

    /// Load from the given TOML file (missing is fine), then the environment
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        Ok(settings)
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), AppError> {
        if !LOG_LEVELS.contains(&self.log.level.as_str()) {
            return Err(AppError::Config(format!("invalid log level: {}", self.log.level)));
        }

        self.session_settings().validate()?;

        self.password.cost().params()?;
        if self.password.requirements.min_length < 8 {
            return Err(AppError::Config(
                "minimum password length must be at least 8".to_string(),
            ));
        }

        if self.reset.token_ttl_secs == 0 {
            return Err(AppError::Config("reset token ttl must be positive".to_string()));
        }

        Ok(())
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            cookie_name: self.session.cookie_name.clone(),
            secret_key: self.session.secret_key.clone(),
            token_lifetime: Duration::from_secs(self.session.token_lifetime_secs),
            inactivity_limit: Duration::from_secs(self.session.inactivity_limit_secs),
        }
    }

    pub fn reset_settings(&self) -> ResetSettings {
        ResetSettings {
            token_ttl: Duration::from_secs(self.reset.token_ttl_secs),
            email_subject: self.reset.email_subject.clone(),
            requirements: self.password.requirements.clone(),
            cost: self.password.cost(),
        }
    }
}
