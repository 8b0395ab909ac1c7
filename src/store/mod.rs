//! Persistence seam for accounts and login history.
//!
//! Every auth component talks to the relational store through [`AuthStore`].
//! Operations that must be atomic (bounded history append, unlock with history
//! trim) are single trait methods so each backend can run them in one
//! transaction.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::{fmt, str::FromStr};
use utoipa::ToSchema;

pub mod memory;
pub mod postgres;

pub use self::memory::MemoryStore;
pub use self::postgres::PgStore;

/// Outcome of a single login attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }

    #[must_use]
    pub const fn from_verified(verified: bool) -> Self {
        if verified {
            Self::Success
        } else {
            Self::Failure
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Outcome {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "success" => Ok(Self::Success),
            "failure" => Ok(Self::Failure),
            other => Err(anyhow::anyhow!("unknown login outcome: {other}")),
        }
    }
}

/// One row of `login_history`. Never updated once written.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct LoginAttempt {
    pub id: i64,
    pub account_id: String,
    pub occurred_at: i64,
    pub outcome: Outcome,
}

/// Panel account with its lockout and session state stored in-line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Account {
    pub account_id: String,
    pub user_name: String,
    /// Reversibly encrypted password (see `auth::credential`).
    pub credential: String,
    pub active: bool,
    pub lock_until: Option<i64>,
    pub fail_threshold: Option<i64>,
    pub fail_window_seconds: Option<i64>,
    pub lock_duration_seconds: Option<i64>,
    pub session_token: Option<String>,
    pub session_ttl_seconds: Option<i64>,
    pub session_expires_at: Option<i64>,
}

impl Account {
    /// New account with no lock, no session and server-default policy.
    #[must_use]
    pub fn new(account_id: String, user_name: String, credential: String) -> Self {
        Self {
            account_id,
            user_name,
            credential,
            active: false,
            lock_until: None,
            fail_threshold: None,
            fail_window_seconds: None,
            lock_duration_seconds: None,
            session_token: None,
            session_ttl_seconds: None,
            session_expires_at: None,
        }
    }
}

/// Session fields written onto the account row by a login.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionGrant {
    pub token: String,
    pub ttl_seconds: i64,
    pub expires_at: i64,
}

/// Result of inserting a new account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Created,
    Conflict,
}

/// One page of an account's login history, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryPage {
    pub rows: Vec<LoginAttempt>,
    pub total: i64,
}

#[async_trait]
pub trait AuthStore: Send + Sync {
    /// Insert a new account; a duplicate user name is reported, not raised.
    async fn insert_account(&self, account: &Account) -> Result<InsertOutcome>;

    async fn account_by_id(&self, account_id: &str) -> Result<Option<Account>>;

    async fn account_by_name(&self, user_name: &str) -> Result<Option<Account>>;

    async fn account_by_session(&self, token: &str) -> Result<Option<Account>>;

    /// Set `lock_until`. Returns `false` when the account does not exist.
    async fn set_lock_until(&self, account_id: &str, unlock_at: i64) -> Result<bool>;

    /// Clear `lock_until` and, when `clear_history` is set, trim the account's
    /// history down to its latest success (or latest row of any outcome).
    /// Returns `false` when the account does not exist.
    async fn clear_lock(&self, account_id: &str, clear_history: bool) -> Result<bool>;

    /// Clear an expired lock and trim history as [`AuthStore::clear_lock`]
    /// does, but only while `lock_until` still equals `unlock_at`. Returns
    /// `false`, touching nothing, when the deadline has changed meanwhile.
    async fn clear_expired_lock(&self, account_id: &str, unlock_at: i64) -> Result<bool>;

    /// Atomically evict the oldest rows beyond `max_rows - 1` and append a new
    /// attempt. Returns `None` when the account does not exist.
    async fn append_attempt(
        &self,
        account_id: &str,
        outcome: Outcome,
        occurred_at: i64,
        max_rows: i64,
    ) -> Result<Option<LoginAttempt>>;

    /// Most recent `limit` attempts, newest first.
    async fn recent_attempts(&self, account_id: &str, limit: i64) -> Result<Vec<LoginAttempt>>;

    async fn page_attempts(&self, account_id: &str, limit: i64, offset: i64)
        -> Result<HistoryPage>;

    /// Delete attempts older than `cutoff` across all accounts.
    async fn purge_attempts_before(&self, cutoff: i64) -> Result<u64>;

    /// Overwrite the account's session and mark it active.
    /// Returns `false` when the account does not exist.
    async fn set_session(&self, account_id: &str, grant: &SessionGrant) -> Result<bool>;

    /// Mark the session holder inactive and expire the token at `expired_at`.
    /// Returns `false` when no account holds the token.
    async fn end_session(&self, token: &str, expired_at: i64) -> Result<bool>;

    /// Round-trip to the backend, used by `/health`.
    async fn ping(&self) -> Result<()>;
}
