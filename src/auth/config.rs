//! Server-wide auth defaults.
//!
//! Per-account knobs on the `accounts` row win when they are set and positive.
//! The fail threshold never exceeds [`MAX_HISTORY_PER_ACCOUNT`]: a longer
//! failure streak than the retained history could never be observed.

use super::{history::MAX_HISTORY_PER_ACCOUNT, lockout::LockoutPolicy};
use crate::store::Account;

const DEFAULT_FAIL_THRESHOLD: i64 = 5;
const DEFAULT_LOCKOUT_WINDOW_SECONDS: i64 = 5 * 60;
const DEFAULT_LOCK_DURATION_SECONDS: i64 = 15 * 60;
const DEFAULT_SESSION_TTL_SECONDS: i64 = 10 * 60;
const DEFAULT_HISTORY_RETENTION_DAYS: i64 = 90;
const DEFAULT_HISTORY_SWEEP_INTERVAL_SECONDS: u64 = 60 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    fail_threshold: i64,
    lockout_window_seconds: i64,
    lock_duration_seconds: i64,
    session_ttl_seconds: i64,
    history_retention_days: i64,
    history_sweep_interval_seconds: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            fail_threshold: DEFAULT_FAIL_THRESHOLD,
            lockout_window_seconds: DEFAULT_LOCKOUT_WINDOW_SECONDS,
            lock_duration_seconds: DEFAULT_LOCK_DURATION_SECONDS,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            history_retention_days: DEFAULT_HISTORY_RETENTION_DAYS,
            history_sweep_interval_seconds: DEFAULT_HISTORY_SWEEP_INTERVAL_SECONDS,
        }
    }

    #[must_use]
    pub const fn with_fail_threshold(mut self, threshold: i64) -> Self {
        self.fail_threshold = threshold;
        self
    }

    #[must_use]
    pub const fn with_lockout_window_seconds(mut self, seconds: i64) -> Self {
        self.lockout_window_seconds = seconds;
        self
    }

    #[must_use]
    pub const fn with_lock_duration_seconds(mut self, seconds: i64) -> Self {
        self.lock_duration_seconds = seconds;
        self
    }

    #[must_use]
    pub const fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub const fn with_history_retention_days(mut self, days: i64) -> Self {
        self.history_retention_days = days;
        self
    }

    #[must_use]
    pub const fn with_history_sweep_interval_seconds(mut self, seconds: u64) -> Self {
        self.history_sweep_interval_seconds = seconds;
        self
    }

    #[must_use]
    pub const fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub const fn history_retention_days(&self) -> i64 {
        self.history_retention_days
    }

    #[must_use]
    pub const fn history_sweep_interval_seconds(&self) -> u64 {
        self.history_sweep_interval_seconds
    }

    /// Lockout policy for one account.
    #[must_use]
    pub fn policy_for(&self, account: &Account) -> LockoutPolicy {
        LockoutPolicy {
            fail_threshold: positive_or(account.fail_threshold, self.fail_threshold)
                .min(MAX_HISTORY_PER_ACCOUNT),
            lockout_window_seconds: positive_or(
                account.fail_window_seconds,
                self.lockout_window_seconds,
            ),
            lock_duration_seconds: positive_or(
                account.lock_duration_seconds,
                self.lock_duration_seconds,
            ),
        }
    }

    /// Session lifetime for one account.
    #[must_use]
    pub fn session_ttl_for(&self, account: &Account) -> i64 {
        positive_or(account.session_ttl_seconds, self.session_ttl_seconds)
    }
}

fn positive_or(value: Option<i64>, fallback: i64) -> i64 {
    value.filter(|value| *value > 0).unwrap_or(fallback)
}
