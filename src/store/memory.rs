//! In-process [`AuthStore`] behind a single mutex.
//!
//! Every method takes the one lock for its whole duration, so multi-step
//! operations are as atomic here as their transactional `PgStore` versions.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::{Account, AuthStore, HistoryPage, InsertOutcome, LoginAttempt, Outcome, SessionGrant};

#[derive(Default)]
struct State {
    accounts: HashMap<String, Account>,
    history: Vec<LoginAttempt>,
    next_id: i64,
}

impl State {
    fn newest_first(&self, account_id: &str) -> Vec<LoginAttempt> {
        let mut rows: Vec<LoginAttempt> = self
            .history
            .iter()
            .filter(|row| row.account_id == account_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at).then(b.id.cmp(&a.id)));
        rows
    }

    /// Keep only the latest success, or the latest row when there is none.
    fn trim_history(&mut self, account_id: &str) {
        let rows = self.newest_first(account_id);
        let keep = rows
            .iter()
            .find(|row| row.outcome == Outcome::Success)
            .or_else(|| rows.first())
            .map(|row| row.id);
        self.history
            .retain(|row| row.account_id != account_id || Some(row.id) == keep);
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored history rows for one account.
    pub async fn history_len(&self, account_id: &str) -> usize {
        let state = self.state.lock().await;
        state
            .history
            .iter()
            .filter(|row| row.account_id == account_id)
            .count()
    }
}

#[async_trait]
impl AuthStore for MemoryStore {
    async fn insert_account(&self, account: &Account) -> Result<InsertOutcome> {
        let mut state = self.state.lock().await;
        let taken = state.accounts.contains_key(&account.account_id)
            || state
                .accounts
                .values()
                .any(|existing| existing.user_name == account.user_name);
        if taken {
            return Ok(InsertOutcome::Conflict);
        }
        state
            .accounts
            .insert(account.account_id.clone(), account.clone());
        Ok(InsertOutcome::Created)
    }

    async fn account_by_id(&self, account_id: &str) -> Result<Option<Account>> {
        Ok(self.state.lock().await.accounts.get(account_id).cloned())
    }

    async fn account_by_name(&self, user_name: &str) -> Result<Option<Account>> {
        let state = self.state.lock().await;
        Ok(state
            .accounts
            .values()
            .find(|account| account.user_name == user_name)
            .cloned())
    }

    async fn account_by_session(&self, token: &str) -> Result<Option<Account>> {
        let state = self.state.lock().await;
        Ok(state
            .accounts
            .values()
            .find(|account| account.session_token.as_deref() == Some(token))
            .cloned())
    }

    async fn set_lock_until(&self, account_id: &str, unlock_at: i64) -> Result<bool> {
        let mut state = self.state.lock().await;
        Ok(match state.accounts.get_mut(account_id) {
            Some(account) => {
                account.lock_until = Some(unlock_at);
                true
            }
            None => false,
        })
    }

    async fn clear_lock(&self, account_id: &str, clear_history: bool) -> Result<bool> {
        let mut state = self.state.lock().await;
        let Some(account) = state.accounts.get_mut(account_id) else {
            return Ok(false);
        };
        account.lock_until = None;

        if clear_history {
            state.trim_history(account_id);
        }
        Ok(true)
    }

    async fn clear_expired_lock(&self, account_id: &str, unlock_at: i64) -> Result<bool> {
        let mut state = self.state.lock().await;
        match state.accounts.get_mut(account_id) {
            Some(account) if account.lock_until == Some(unlock_at) => {
                account.lock_until = None;
            }
            _ => return Ok(false),
        }
        state.trim_history(account_id);
        Ok(true)
    }

    async fn append_attempt(
        &self,
        account_id: &str,
        outcome: Outcome,
        occurred_at: i64,
        max_rows: i64,
    ) -> Result<Option<LoginAttempt>> {
        let mut state = self.state.lock().await;
        if !state.accounts.contains_key(account_id) {
            return Ok(None);
        }

        let mut rows = state.newest_first(account_id);
        let count = i64::try_from(rows.len()).unwrap_or(i64::MAX);
        if count >= max_rows {
            let excess = usize::try_from(count - max_rows + 1).unwrap_or(usize::MAX);
            // Oldest rows sit at the tail.
            rows.reverse();
            let evicted: Vec<i64> = rows.iter().take(excess).map(|row| row.id).collect();
            state.history.retain(|row| !evicted.contains(&row.id));
        }

        state.next_id += 1;
        let attempt = LoginAttempt {
            id: state.next_id,
            account_id: account_id.to_string(),
            occurred_at,
            outcome,
        };
        state.history.push(attempt.clone());
        Ok(Some(attempt))
    }

    async fn recent_attempts(&self, account_id: &str, limit: i64) -> Result<Vec<LoginAttempt>> {
        let state = self.state.lock().await;
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(state
            .newest_first(account_id)
            .into_iter()
            .take(limit)
            .collect())
    }

    async fn page_attempts(
        &self,
        account_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<HistoryPage> {
        let state = self.state.lock().await;
        let rows = state.newest_first(account_id);
        let total = i64::try_from(rows.len()).unwrap_or(i64::MAX);
        let offset = usize::try_from(offset).unwrap_or(0);
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(HistoryPage {
            rows: rows.into_iter().skip(offset).take(limit).collect(),
            total,
        })
    }

    async fn purge_attempts_before(&self, cutoff: i64) -> Result<u64> {
        let mut state = self.state.lock().await;
        let before = state.history.len();
        state.history.retain(|row| row.occurred_at >= cutoff);
        Ok(u64::try_from(before - state.history.len()).unwrap_or(u64::MAX))
    }

    async fn set_session(&self, account_id: &str, grant: &SessionGrant) -> Result<bool> {
        let mut state = self.state.lock().await;
        Ok(match state.accounts.get_mut(account_id) {
            Some(account) => {
                account.session_token = Some(grant.token.clone());
                account.session_ttl_seconds = Some(grant.ttl_seconds);
                account.session_expires_at = Some(grant.expires_at);
                account.active = true;
                true
            }
            None => false,
        })
    }

    async fn end_session(&self, token: &str, expired_at: i64) -> Result<bool> {
        let mut state = self.state.lock().await;
        let holder = state
            .accounts
            .values_mut()
            .find(|account| account.session_token.as_deref() == Some(token));
        Ok(match holder {
            Some(account) => {
                account.active = false;
                account.session_expires_at = Some(expired_at);
                true
            }
            None => false,
        })
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
