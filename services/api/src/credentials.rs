//! Admin credential verification

use anyhow::Result;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use std::sync::Arc;
use tracing::info;

use crate::config::AppConfig;

/// The single configured admin account
#[derive(Clone)]
pub struct AdminCredentials {
    username: String,
    password_hash: Arc<str>,
}

impl AdminCredentials {
    /// Hash a plaintext password once so logins never compare plaintext
    pub fn from_plaintext(username: &str, password: &str) -> Result<Self> {
        Self::hash_with(Argon2::default(), username, password)
    }

    /// Use a pre-computed Argon2 PHC string
    pub fn from_hash(username: &str, password_hash: &str) -> Result<Self> {
        PasswordHash::new(password_hash)
            .map_err(|e| anyhow::anyhow!("Failed to parse password hash: {}", e))?;

        Ok(Self {
            username: username.to_string(),
            password_hash: Arc::from(password_hash),
        })
    }

    /// Build from `ADMIN_PASSWORD_HASH`, falling back to `ADMIN_PASSWORD`
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        match (&config.admin_password_hash, &config.admin_password) {
            (Some(hash), _) => {
                info!("Using pre-hashed admin password");
                Self::from_hash(&config.admin_username, hash)
            }
            (None, Some(password)) => Self::from_plaintext(&config.admin_username, password),
            (None, None) => anyhow::bail!("No admin password configured"),
        }
    }

    fn hash_with(argon2: Argon2<'_>, username: &str, password: &str) -> Result<Self> {
        let salt = SaltString::generate(&mut rand::thread_rng());
        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
            .to_string();

        Ok(Self {
            username: username.to_string(),
            password_hash: Arc::from(password_hash),
        })
    }

    /// Check a login attempt. Both fields are always checked.
    pub fn verify(&self, username: &str, password: &str) -> bool {
        let username_matches = self.username == username;

        let password_matches = PasswordHash::new(&self.password_hash)
            .map(|parsed| {
                Argon2::default()
                    .verify_password(password.as_bytes(), &parsed)
                    .is_ok()
            })
            .unwrap_or(false);

        username_matches & password_matches
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

#[cfg(test)]
impl AdminCredentials {
    /// Cheap Argon2 parameters so tests do not spend seconds hashing
    pub fn for_tests(username: &str, password: &str) -> Self {
        let params = argon2::Params::new(1024, 1, 1, None).expect("valid argon2 params");
        let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);
        Self::hash_with(argon2, username, password).expect("hashing should succeed")
    }
}
