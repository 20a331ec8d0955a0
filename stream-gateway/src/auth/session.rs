//! In-memory login sessions.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "session";

/// Default session lifetime (12 hours).
pub const DEFAULT_SESSION_TTL_SECS: u64 = 43_200;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Session {
    #[serde(skip)]
    pub token: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Session table keyed by opaque token. Lost on restart.
#[derive(Debug)]
pub struct SessionStore {
    sessions: DashMap<String, Session>,
    ttl_secs: u64,
}

impl SessionStore {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl_secs,
        }
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    pub fn issue(&self, username: &str) -> Session {
        let now = Utc::now();
        let session = Session {
            token: uuid::Uuid::new_v4().simple().to_string(),
            username: username.to_string(),
            created_at: now,
            expires_at: now + Duration::seconds(self.ttl_secs as i64),
        };
        self.sessions
            .insert(session.token.clone(), session.clone());
        debug!(username, "Session issued");
        session
    }

    /// Look up a live session. Expired sessions are removed.
    pub fn validate(&self, token: &str) -> Option<Session> {
        let session = self.sessions.get(token).map(|s| s.clone())?;
        if session.is_expired(Utc::now()) {
            self.sessions.remove(token);
            return None;
        }
        Some(session)
    }

    pub fn revoke(&self, token: &str) -> bool {
        self.sessions.remove(token).is_some()
    }

    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, s| !s.is_expired(now));
        before.saturating_sub(self.sessions.len())
    }

    /// Sweep expired sessions every `interval` until cancelled.
    pub fn start_purge_task(self: &Arc<Self>, interval: std::time::Duration, cancel_token: CancellationToken) {
        let store = Arc::clone(self);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        debug!("Session purge task shutting down");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        let purged = store.purge_expired();
                        if purged > 0 {
                            debug!(purged, "Purged expired sessions");
                        }
                    }
                }
            }
        });
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL_SECS)
    }
}
