//! Capacity-bounded ledger of login attempts.

use std::sync::Arc;
use tracing::debug;

use super::{
    clock::Clock,
    error::{AuthError, AuthResult},
};
use crate::store::{AuthStore, LoginAttempt, Outcome};

/// Rows kept per account; the oldest are evicted first.
pub const MAX_HISTORY_PER_ACCOUNT: i64 = 10;
pub const PAGE_SIZE: i64 = 50;
const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// One page of history as served to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryListing {
    /// Page actually served, after clamping.
    pub page: i64,
    pub total: i64,
    pub rows: Vec<LoginAttempt>,
}

#[derive(Clone)]
pub struct LoginHistoryLog {
    store: Arc<dyn AuthStore>,
    clock: Arc<dyn Clock>,
}

impl LoginHistoryLog {
    #[must_use]
    pub fn new(store: Arc<dyn AuthStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Append an attempt stamped with the current server time, evicting the
    /// oldest rows so the account never exceeds [`MAX_HISTORY_PER_ACCOUNT`].
    ///
    /// # Errors
    /// `NotFound` for an unknown account, `Store` if the transaction fails.
    pub async fn record(&self, account_id: &str, outcome: Outcome) -> AuthResult<LoginAttempt> {
        let attempt = self
            .store
            .append_attempt(
                account_id,
                outcome,
                self.clock.now(),
                MAX_HISTORY_PER_ACCOUNT,
            )
            .await?
            .ok_or(AuthError::NotFound("account"))?;
        debug!(account_id, %outcome, id = attempt.id, "login attempt recorded");
        Ok(attempt)
    }

    /// Newest-first page of an account's history. Pages start at 1; anything
    /// lower is served as page 1.
    ///
    /// # Errors
    /// `Store` if the query fails.
    pub async fn list_recent(&self, account_id: &str, page: i64) -> AuthResult<HistoryListing> {
        let page = page.max(1);
        let offset = (page - 1).saturating_mul(PAGE_SIZE);
        let found = self
            .store
            .page_attempts(account_id, PAGE_SIZE, offset)
            .await?;
        Ok(HistoryListing {
            page,
            total: found.total,
            rows: found.rows,
        })
    }

    /// Delete history older than `older_than_days` across all accounts.
    ///
    /// # Errors
    /// `Validation` when `older_than_days` is not positive, `Store` if the
    /// delete fails.
    pub async fn purge(&self, older_than_days: i64) -> AuthResult<u64> {
        if older_than_days <= 0 {
            return Err(AuthError::validation("retention days must be positive"));
        }
        let cutoff = self
            .clock
            .now()
            .saturating_sub(older_than_days.saturating_mul(SECONDS_PER_DAY));
        Ok(self.store.purge_attempts_before(cutoff).await?)
    }
}
