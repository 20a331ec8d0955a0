//! Configured user credentials with Argon2 password hashes.

use std::collections::HashMap;

use argon2::{
    Argon2, Params,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::AuthError;

/// A configured login. Either `password_hash` (PHC string) or a plaintext
/// `password` that is hashed on startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UserConfig {
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
}

/// Hash a password with Argon2id.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    // OWASP recommended parameters: m=19456 (19 MiB), t=2, p=1
    let params = Params::new(19456, 2, 1, None)
        .map_err(|e| AuthError::Internal(format!("Invalid Argon2 params: {}", e)))?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::Internal(format!("Password hashing failed: {}", e)))?
        .to_string();

    Ok(password_hash)
}

/// Verify a password against a PHC hash string.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AuthError::Internal(format!("Invalid password hash format: {}", e)))?;

    // Parameters are read from the hash itself.
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// In-memory user table.
pub struct CredentialStore {
    users: HashMap<String, String>,
    // Verified against for unknown usernames so both paths cost the same.
    decoy_hash: String,
}

impl CredentialStore {
    pub fn from_config(users: &[UserConfig]) -> Result<Self, AuthError> {
        let mut table = HashMap::with_capacity(users.len());

        for user in users {
            let username = user.username.trim();
            if username.is_empty() {
                return Err(AuthError::Internal("user without username".to_string()));
            }

            let hash = match (&user.password_hash, &user.password) {
                (Some(hash), _) => {
                    PasswordHash::new(hash).map_err(|e| {
                        AuthError::Internal(format!("Invalid password hash for {}: {}", username, e))
                    })?;
                    hash.clone()
                }
                (None, Some(password)) => hash_password(password)?,
                (None, None) => {
                    return Err(AuthError::Internal(format!(
                        "user {} has neither password nor password_hash",
                        username
                    )));
                }
            };

            if table.insert(username.to_string(), hash).is_some() {
                warn!(username, "Duplicate user entry, last one wins");
            }
        }

        Ok(Self {
            users: table,
            decoy_hash: hash_password("decoy-password")?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Check a username/password pair.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<bool, AuthError> {
        match self.users.get(username) {
            Some(hash) => verify_password(password, hash),
            None => {
                verify_password(password, &self.decoy_hash)?;
                Ok(false)
            }
        }
    }
}
