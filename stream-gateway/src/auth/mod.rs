//! Authentication gate.
//!
//! Login attempts are checked against the [`LoginAttemptGovernor`] before
//! any password work happens and recorded after it. Successful logins get
//! an in-memory [`Session`].

pub mod credentials;
pub mod governor;
pub mod session;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

pub use credentials::{CredentialStore, UserConfig, hash_password, verify_password};
pub use governor::{AttemptDecision, LoginAttemptEntry, LoginAttemptGovernor};
pub use session::{DEFAULT_SESSION_TTL_SECS, SESSION_COOKIE, Session, SessionStore};

/// Authentication service errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing credentials")]
    MissingCredentials,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Authentication settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AuthConfig {
    pub users: Vec<UserConfig>,
    /// Guard the stream routes behind a session cookie.
    pub require_session: bool,
    pub session_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            users: Vec::new(),
            require_session: false,
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
        }
    }
}

/// Result of one login attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Success(Session),
    /// The identity was already locked when the attempt arrived.
    TooManyAttempts { retry_after_secs: u64 },
    /// This failure tipped the identity into a lock.
    Locked { retry_after_secs: u64 },
    InvalidCredentials { remaining: u32 },
}

pub struct AuthService {
    credentials: Arc<CredentialStore>,
    governor: Arc<LoginAttemptGovernor>,
    sessions: Arc<SessionStore>,
    require_session: bool,
}

impl AuthService {
    pub fn new(
        credentials: CredentialStore,
        governor: Arc<LoginAttemptGovernor>,
        sessions: Arc<SessionStore>,
        require_session: bool,
    ) -> Self {
        Self {
            credentials: Arc::new(credentials),
            governor,
            sessions,
            require_session,
        }
    }

    pub fn from_config(
        config: &AuthConfig,
        governor: Arc<LoginAttemptGovernor>,
    ) -> Result<Self, AuthError> {
        let credentials = CredentialStore::from_config(&config.users)?;
        let sessions = Arc::new(SessionStore::new(config.session_ttl_secs));
        Ok(Self::new(
            credentials,
            governor,
            sessions,
            config.require_session,
        ))
    }

    pub fn governor(&self) -> &Arc<LoginAttemptGovernor> {
        &self.governor
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Whether stream routes need a session. Never true without users.
    pub fn session_required(&self) -> bool {
        self.require_session && !self.credentials.is_empty()
    }

    /// Run one login attempt for `identity`.
    pub async fn login(
        &self,
        identity: &str,
        username: &str,
        password: &str,
    ) -> Result<LoginOutcome, AuthError> {
        if let AttemptDecision::Denied { retry_after_secs } = self.governor.can_attempt(identity) {
            warn!(identity, retry_after_secs, "Login attempt while locked");
            return Ok(LoginOutcome::TooManyAttempts { retry_after_secs });
        }

        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        // Argon2 verification is CPU bound.
        let store = Arc::clone(&self.credentials);
        let (user, pass) = (username.to_string(), password.to_string());
        let valid = tokio::task::spawn_blocking(move || store.authenticate(&user, &pass))
            .await
            .map_err(|e| AuthError::Internal(format!("Password verification task failed: {}", e)))??;

        if valid {
            self.governor.record_success(identity);
            let session = self.sessions.issue(username);
            info!(identity, username, "Login succeeded");
            return Ok(LoginOutcome::Success(session));
        }

        let now = governor::now_ms();
        let entry = self.governor.record_failure_at(identity, now);
        if entry.is_locked(now) {
            return Ok(LoginOutcome::Locked {
                retry_after_secs: entry.retry_after_secs(now),
            });
        }

        warn!(identity, count = entry.count, "Login failed");
        Ok(LoginOutcome::InvalidCredentials {
            remaining: entry.remaining_attempts(),
        })
    }

    pub fn logout(&self, token: &str) -> bool {
        self.sessions.revoke(token)
    }

    pub fn session(&self, token: &str) -> Option<Session> {
        self.sessions.validate(token)
    }
}
