//! Login attempt governor.
//!
//! Tracks failed logins per client identity in a sliding window and locks
//! the identity out with exponentially growing durations once the window
//! allowance is used up:
//!
//! - up to [`MAX_ATTEMPTS_WINDOW`] failures inside [`WINDOW_MS`] are free,
//! - every further failure locks for `BASE_LOCK_MS * 2^(over - 1)`, capped
//!   at [`MAX_LOCK_MULTIPLIER`] times the base,
//! - a successful login clears the identity completely.
//!
//! All timestamps are unix milliseconds. The `*_at` variants take `now`
//! explicitly; the plain variants use the wall clock.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Failures allowed inside one window before locking kicks in.
pub const MAX_ATTEMPTS_WINDOW: u32 = 5;

/// Length of the counting window (10 minutes).
pub const WINDOW_MS: i64 = 600_000;

/// Lock duration for the first failure over the allowance (5 minutes).
pub const BASE_LOCK_MS: i64 = 300_000;

/// Upper bound of the lock multiplier (8 × 5 min = 40 min).
pub const MAX_LOCK_MULTIPLIER: i64 = 8;

/// Interval of the background sweep removing stale entries.
const PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Per-identity failure record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginAttemptEntry {
    /// Failures in the current window.
    pub count: u32,
    /// Start of the current window.
    pub first: i64,
    /// Most recent failure.
    pub last: i64,
    /// Lock expiry, 0 when never locked.
    pub locked_until: i64,
}

impl LoginAttemptEntry {
    fn fresh(now: i64) -> Self {
        Self {
            count: 0,
            first: now,
            last: now,
            locked_until: 0,
        }
    }

    pub fn is_locked(&self, now: i64) -> bool {
        self.locked_until > now
    }

    pub fn window_expired(&self, now: i64) -> bool {
        now - self.first > WINDOW_MS
    }

    /// Seconds until the lock lifts, rounded up. 0 when not locked.
    pub fn retry_after_secs(&self, now: i64) -> u64 {
        if !self.is_locked(now) {
            return 0;
        }
        ((self.locked_until - now) as u64).div_ceil(1000)
    }

    /// Failures left before the next one locks the identity.
    pub fn remaining_attempts(&self) -> u32 {
        MAX_ATTEMPTS_WINDOW.saturating_sub(self.count)
    }
}

/// Lock duration for a failure count, or `None` while under the allowance.
pub fn lock_duration_ms(count: u32) -> Option<i64> {
    let over = count.checked_sub(MAX_ATTEMPTS_WINDOW).filter(|o| *o > 0)?;
    // 2^(over-1), saturating at the multiplier cap before it can overflow.
    let multiplier = 1i64
        .checked_shl(over - 1)
        .filter(|m| *m > 0)
        .map_or(MAX_LOCK_MULTIPLIER, |m| m.min(MAX_LOCK_MULTIPLIER));
    Some(BASE_LOCK_MS * multiplier)
}

/// Outcome of a pre-authentication check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptDecision {
    Allowed,
    Denied { retry_after_secs: u64 },
}

impl AttemptDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AttemptDecision::Allowed)
    }
}

/// Process-wide failed-login bookkeeping.
///
/// Each update runs under the map's entry lock, so concurrent logins from
/// the same identity cannot lose a failure.
#[derive(Debug, Default)]
pub struct LoginAttemptGovernor {
    entries: DashMap<String, LoginAttemptEntry>,
}

impl LoginAttemptGovernor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn can_attempt(&self, id: &str) -> AttemptDecision {
        self.can_attempt_at(id, now_ms())
    }

    pub fn can_attempt_at(&self, id: &str, now: i64) -> AttemptDecision {
        // Copy out so the shard lock is released before any removal.
        let Some(entry) = self.entries.get(id).map(|e| *e) else {
            return AttemptDecision::Allowed;
        };

        if entry.is_locked(now) {
            return AttemptDecision::Denied {
                retry_after_secs: entry.retry_after_secs(now),
            };
        }

        if entry.window_expired(now) {
            self.entries
                .remove_if(id, |_, e| !e.is_locked(now) && e.window_expired(now));
            debug!(id, "Dropped stale login attempt entry");
        }

        AttemptDecision::Allowed
    }

    pub fn record_failure(&self, id: &str) -> LoginAttemptEntry {
        self.record_failure_at(id, now_ms())
    }

    /// Count a failed login and return the updated entry.
    pub fn record_failure_at(&self, id: &str, now: i64) -> LoginAttemptEntry {
        let mut entry = self
            .entries
            .entry(id.to_string())
            .or_insert_with(|| LoginAttemptEntry::fresh(now));

        if entry.window_expired(now) && !entry.is_locked(now) {
            entry.count = 1;
            entry.first = now;
        } else {
            entry.count += 1;
        }
        entry.last = now;

        if let Some(lock_ms) = lock_duration_ms(entry.count) {
            entry.locked_until = now + lock_ms;
            warn!(
                id,
                count = entry.count,
                lock_secs = lock_ms / 1000,
                "Login locked after repeated failures"
            );
        }

        *entry
    }

    /// Clear all state for an identity after a successful login.
    pub fn record_success(&self, id: &str) {
        if self.entries.remove(id).is_some() {
            debug!(id, "Cleared login attempt entry");
        }
    }

    pub fn get(&self, id: &str) -> Option<LoginAttemptEntry> {
        self.entries.get(id).map(|e| *e)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove entries whose window expired and that hold no active lock.
    pub fn purge_stale_at(&self, now: i64) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, e| e.is_locked(now) || !e.window_expired(now));
        before.saturating_sub(self.entries.len())
    }

    /// Start the periodic stale-entry sweep.
    pub fn start_purge_task(self: &Arc<Self>, cancel_token: CancellationToken) {
        let governor = Arc::clone(self);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        debug!("Login attempt purge task shutting down");
                        break;
                    }
                    _ = tokio::time::sleep(PURGE_INTERVAL) => {
                        let purged = governor.purge_stale_at(now_ms());
                        if purged > 0 {
                            info!(purged, "Purged stale login attempt entries");
                        }
                    }
                }
            }
        });
    }
}

pub(crate) fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "203.0.113.7";
    const T0: i64 = 1_700_000_000_000;

    fn fail_n(governor: &LoginAttemptGovernor, n: u32, now: i64) -> LoginAttemptEntry {
        let mut last = None;
        for _ in 0..n {
            last = Some(governor.record_failure_at(ID, now));
        }
        last.unwrap()
    }

    #[test]
    fn test_unknown_identity_is_allowed() {
        let governor = LoginAttemptGovernor::new();
        assert_eq!(governor.can_attempt_at(ID, T0), AttemptDecision::Allowed);
    }

    #[test]
    fn test_first_failure_creates_entry() {
        let governor = LoginAttemptGovernor::new();
        let entry = governor.record_failure_at(ID, T0);
        assert_eq!(
            entry,
            LoginAttemptEntry {
                count: 1,
                first: T0,
                last: T0,
                locked_until: 0
            }
        );
        assert_eq!(entry.remaining_attempts(), 4);
    }

    #[test]
    fn test_five_failures_stay_allowed() {
        let governor = LoginAttemptGovernor::new();
        for i in 0..5 {
            let entry = governor.record_failure_at(ID, T0 + i * 1000);
            assert_eq!(entry.locked_until, 0);
            assert!(governor.can_attempt_at(ID, T0 + i * 1000).is_allowed());
        }
        assert_eq!(governor.get(ID).unwrap().remaining_attempts(), 0);
    }

    #[test]
    fn test_sixth_failure_locks_for_base_duration() {
        let governor = LoginAttemptGovernor::new();
        fail_n(&governor, 5, T0);
        let entry = governor.record_failure_at(ID, T0 + 10_000);

        assert_eq!(entry.count, 6);
        assert_eq!(entry.locked_until, T0 + 10_000 + BASE_LOCK_MS);
        assert_eq!(
            governor.can_attempt_at(ID, T0 + 10_000),
            AttemptDecision::Denied {
                retry_after_secs: 300
            }
        );
        // Rounded up to whole seconds.
        assert_eq!(
            governor.can_attempt_at(ID, T0 + 10_000 + 1),
            AttemptDecision::Denied {
                retry_after_secs: 300
            }
        );
        assert_eq!(
            governor.can_attempt_at(ID, T0 + 10_000 + BASE_LOCK_MS - 1),
            AttemptDecision::Denied {
                retry_after_secs: 1
            }
        );
        assert!(
            governor
                .can_attempt_at(ID, T0 + 10_000 + BASE_LOCK_MS)
                .is_allowed()
        );
    }

    #[test]
    fn test_failure_after_unlock_escalates() {
        let governor = LoginAttemptGovernor::new();
        let sixth = fail_n(&governor, 6, T0);
        let unlocked_at = sixth.locked_until + 1;

        assert!(governor.can_attempt_at(ID, unlocked_at).is_allowed());
        let seventh = governor.record_failure_at(ID, unlocked_at);
        assert_eq!(seventh.count, 7);
        assert_eq!(seventh.locked_until, unlocked_at + BASE_LOCK_MS * 2);
    }

    #[test]
    fn test_lock_multiplier_is_capped() {
        assert_eq!(lock_duration_ms(5), None);
        assert_eq!(lock_duration_ms(6), Some(BASE_LOCK_MS));
        assert_eq!(lock_duration_ms(7), Some(BASE_LOCK_MS * 2));
        assert_eq!(lock_duration_ms(8), Some(BASE_LOCK_MS * 4));
        assert_eq!(lock_duration_ms(9), Some(BASE_LOCK_MS * 8));
        assert_eq!(lock_duration_ms(10), Some(BASE_LOCK_MS * 8));
        assert_eq!(lock_duration_ms(200), Some(BASE_LOCK_MS * 8));
        assert_eq!(lock_duration_ms(u32::MAX), Some(BASE_LOCK_MS * 8));

        let governor = LoginAttemptGovernor::new();
        let entry = fail_n(&governor, 30, T0);
        assert_eq!(entry.locked_until - T0, BASE_LOCK_MS * MAX_LOCK_MULTIPLIER);
    }

    #[test]
    fn test_success_clears_entry() {
        let governor = LoginAttemptGovernor::new();
        fail_n(&governor, 6, T0);
        governor.record_success(ID);

        assert!(governor.get(ID).is_none());
        assert!(governor.can_attempt_at(ID, T0).is_allowed());
        assert_eq!(governor.record_failure_at(ID, T0 + 1).count, 1);
    }

    #[test]
    fn test_window_expiry_resets_count() {
        let governor = LoginAttemptGovernor::new();
        fail_n(&governor, 4, T0);

        let later = T0 + WINDOW_MS + 1;
        let entry = governor.record_failure_at(ID, later);
        assert_eq!(entry.count, 1);
        assert_eq!(entry.first, later);
        assert_eq!(entry.locked_until, 0);
    }

    #[test]
    fn test_window_boundary_is_inclusive() {
        let governor = LoginAttemptGovernor::new();
        fail_n(&governor, 3, T0);
        // Exactly WINDOW_MS later the window is still open.
        assert_eq!(governor.record_failure_at(ID, T0 + WINDOW_MS).count, 4);
    }

    #[test]
    fn test_active_lock_prevents_window_reset() {
        let governor = LoginAttemptGovernor::new();
        // Lock far enough into the window that it outlives it.
        fail_n(&governor, 5, T0);
        let locked = governor.record_failure_at(ID, T0 + WINDOW_MS - 1000);
        assert!(locked.is_locked(T0 + WINDOW_MS + 1000));

        let entry = governor.record_failure_at(ID, T0 + WINDOW_MS + 1000);
        assert_eq!(entry.count, 7);
    }

    #[test]
    fn test_stale_entry_is_dropped_on_check() {
        let governor = LoginAttemptGovernor::new();
        fail_n(&governor, 2, T0);

        assert!(governor.can_attempt_at(ID, T0 + WINDOW_MS + 1).is_allowed());
        assert!(governor.get(ID).is_none());
    }

    #[test]
    fn test_purge_keeps_locked_and_recent_entries() {
        let governor = LoginAttemptGovernor::new();
        governor.record_failure_at("stale", T0);
        governor.record_failure_at("recent", T0 + WINDOW_MS);
        for _ in 0..9 {
            governor.record_failure_at("locked", T0);
        }

        let purged = governor.purge_stale_at(T0 + WINDOW_MS + 1);
        assert_eq!(purged, 1);
        assert!(governor.get("stale").is_none());
        assert!(governor.get("recent").is_some());
        assert!(governor.get("locked").is_some());
    }

    #[test]
    fn test_identities_are_independent() {
        let governor = LoginAttemptGovernor::new();
        for _ in 0..6 {
            governor.record_failure_at("a", T0);
        }
        assert!(!governor.can_attempt_at("a", T0).is_allowed());
        assert!(governor.can_attempt_at("b", T0).is_allowed());
    }
}
