//! Per-account lock flag with lazy expiry.

use std::sync::Arc;
use tracing::info;

use super::{
    clock::Clock,
    error::{AuthError, AuthResult},
};
use crate::store::AuthStore;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockState {
    Unlocked,
    Locked { unlock_at: i64 },
}

impl LockState {
    #[must_use]
    pub const fn is_locked(self) -> bool {
        matches!(self, Self::Locked { .. })
    }
}

#[derive(Clone)]
pub struct LockManager {
    store: Arc<dyn AuthStore>,
    clock: Arc<dyn Clock>,
}

impl LockManager {
    #[must_use]
    pub fn new(store: Arc<dyn AuthStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Current lock state. A lock whose deadline has passed is cleared here
    /// (with history trim) and reported as unlocked. The clear only applies
    /// to the deadline that was read; a lock set in between is kept.
    ///
    /// # Errors
    /// `NotFound` for an unknown account, `Store` on store failure.
    pub async fn check_lock_status(&self, account_id: &str) -> AuthResult<LockState> {
        let account = self
            .store
            .account_by_id(account_id)
            .await?
            .ok_or(AuthError::NotFound("account"))?;

        match account.lock_until {
            Some(unlock_at) if unlock_at > 0 => {
                if unlock_at > self.clock.now() {
                    Ok(LockState::Locked { unlock_at })
                } else if self.store.clear_expired_lock(account_id, unlock_at).await? {
                    info!(account_id, unlock_at, "lock expired, cleared");
                    Ok(LockState::Unlocked)
                } else {
                    self.current_lock(account_id).await
                }
            }
            _ => Ok(LockState::Unlocked),
        }
    }

    /// Lock state as stored right now, without lazy expiry.
    async fn current_lock(&self, account_id: &str) -> AuthResult<LockState> {
        let account = self
            .store
            .account_by_id(account_id)
            .await?
            .ok_or(AuthError::NotFound("account"))?;
        Ok(match account.lock_until {
            Some(unlock_at) if unlock_at > self.clock.now() => LockState::Locked { unlock_at },
            _ => LockState::Unlocked,
        })
    }

    /// Set the lock deadline, overwriting any previous one.
    ///
    /// # Errors
    /// `NotFound` for an unknown account, `Store` on store failure.
    pub async fn lock(&self, account_id: &str, unlock_at: i64) -> AuthResult<()> {
        if !self.store.set_lock_until(account_id, unlock_at).await? {
            return Err(AuthError::NotFound("account"));
        }
        info!(account_id, unlock_at, "account locked");
        Ok(())
    }

    /// Clear the lock. With `clear_history`, only the latest success (or the
    /// latest row when there is none) is kept.
    ///
    /// # Errors
    /// `NotFound` for an unknown account, `Store` on store failure.
    pub async fn unlock(&self, account_id: &str, clear_history: bool) -> AuthResult<()> {
        if !self.store.clear_lock(account_id, clear_history).await? {
            return Err(AuthError::NotFound("account"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::clock::ManualClock;
    use crate::store::{
        Account, HistoryPage, InsertOutcome, LoginAttempt, MemoryStore, Outcome, SessionGrant,
    };
    use async_trait::async_trait;

    /// Store where another request re-locks the account right before the
    /// expired lock is cleared.
    struct RelockingStore {
        inner: MemoryStore,
        relock_at: i64,
    }

    #[async_trait]
    impl AuthStore for RelockingStore {
        async fn insert_account(&self, account: &Account) -> anyhow::Result<InsertOutcome> {
            self.inner.insert_account(account).await
        }
        async fn account_by_id(&self, account_id: &str) -> anyhow::Result<Option<Account>> {
            self.inner.account_by_id(account_id).await
        }
        async fn account_by_name(&self, user_name: &str) -> anyhow::Result<Option<Account>> {
            self.inner.account_by_name(user_name).await
        }
        async fn account_by_session(&self, token: &str) -> anyhow::Result<Option<Account>> {
            self.inner.account_by_session(token).await
        }
        async fn set_lock_until(&self, account_id: &str, unlock_at: i64) -> anyhow::Result<bool> {
            self.inner.set_lock_until(account_id, unlock_at).await
        }
        async fn clear_lock(&self, account_id: &str, clear_history: bool) -> anyhow::Result<bool> {
            self.inner.clear_lock(account_id, clear_history).await
        }
        async fn clear_expired_lock(
            &self,
            account_id: &str,
            unlock_at: i64,
        ) -> anyhow::Result<bool> {
            self.inner.set_lock_until(account_id, self.relock_at).await?;
            self.inner.clear_expired_lock(account_id, unlock_at).await
        }
        async fn append_attempt(
            &self,
            account_id: &str,
            outcome: Outcome,
            occurred_at: i64,
            max_rows: i64,
        ) -> anyhow::Result<Option<LoginAttempt>> {
            self.inner
                .append_attempt(account_id, outcome, occurred_at, max_rows)
                .await
        }
        async fn recent_attempts(
            &self,
            account_id: &str,
            limit: i64,
        ) -> anyhow::Result<Vec<LoginAttempt>> {
            self.inner.recent_attempts(account_id, limit).await
        }
        async fn page_attempts(
            &self,
            account_id: &str,
            limit: i64,
            offset: i64,
        ) -> anyhow::Result<HistoryPage> {
            self.inner.page_attempts(account_id, limit, offset).await
        }
        async fn purge_attempts_before(&self, cutoff: i64) -> anyhow::Result<u64> {
            self.inner.purge_attempts_before(cutoff).await
        }
        async fn set_session(
            &self,
            account_id: &str,
            grant: &SessionGrant,
        ) -> anyhow::Result<bool> {
            self.inner.set_session(account_id, grant).await
        }
        async fn end_session(&self, token: &str, expired_at: i64) -> anyhow::Result<bool> {
            self.inner.end_session(token, expired_at).await
        }
        async fn ping(&self) -> anyhow::Result<()> {
            self.inner.ping().await
        }
    }

    async fn setup() -> anyhow::Result<(Arc<MemoryStore>, Arc<ManualClock>, LockManager)> {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_account(&Account::new("a1".into(), "alice".into(), "x".into()))
            .await?;
        let clock = Arc::new(ManualClock::new(10_000));
        let locks = LockManager::new(store.clone(), clock.clone());
        Ok((store, clock, locks))
    }

    #[tokio::test]
    async fn lock_then_lazy_expiry() -> anyhow::Result<()> {
        let (_store, clock, locks) = setup().await?;
        assert_eq!(locks.check_lock_status("a1").await?, LockState::Unlocked);

        locks.lock("a1", 10_100).await?;
        assert_eq!(
            locks.check_lock_status("a1").await?,
            LockState::Locked { unlock_at: 10_100 }
        );

        // Deadline reached: unlocked, and stays unlocked on a second check.
        clock.set(10_100);
        assert_eq!(locks.check_lock_status("a1").await?, LockState::Unlocked);
        assert_eq!(locks.check_lock_status("a1").await?, LockState::Unlocked);
        Ok(())
    }

    #[tokio::test]
    async fn lazy_expiry_clears_the_field() -> anyhow::Result<()> {
        let (store, clock, locks) = setup().await?;
        locks.lock("a1", 10_050).await?;
        clock.advance(60);
        locks.check_lock_status("a1").await?;
        let account = store.account_by_id("a1").await?;
        assert_eq!(account.and_then(|a| a.lock_until), None);
        Ok(())
    }

    #[tokio::test]
    async fn unlock_keeps_latest_success() -> anyhow::Result<()> {
        let (store, _clock, locks) = setup().await?;
        store.append_attempt("a1", Outcome::Success, 1, 10).await?;
        store.append_attempt("a1", Outcome::Success, 2, 10).await?;
        store.append_attempt("a1", Outcome::Failure, 3, 10).await?;
        store.append_attempt("a1", Outcome::Failure, 4, 10).await?;

        locks.unlock("a1", true).await?;
        let rows = store.recent_attempts("a1", 10).await?;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].occurred_at, 2);
        assert_eq!(rows[0].outcome, Outcome::Success);
        Ok(())
    }

    #[tokio::test]
    async fn unlock_without_success_keeps_latest_row() -> anyhow::Result<()> {
        let (store, _clock, locks) = setup().await?;
        for at in 1..=5 {
            store.append_attempt("a1", Outcome::Failure, at, 10).await?;
        }
        locks.unlock("a1", true).await?;
        let rows = store.recent_attempts("a1", 10).await?;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].occurred_at, 5);
        Ok(())
    }

    #[tokio::test]
    async fn unlock_without_trim_keeps_history() -> anyhow::Result<()> {
        let (store, _clock, locks) = setup().await?;
        for at in 1..=3 {
            store.append_attempt("a1", Outcome::Failure, at, 10).await?;
        }
        locks.lock("a1", 20_000).await?;
        locks.unlock("a1", false).await?;
        assert_eq!(store.history_len("a1").await, 3);
        assert_eq!(locks.check_lock_status("a1").await?, LockState::Unlocked);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_account_is_not_found() -> anyhow::Result<()> {
        let (_store, _clock, locks) = setup().await?;
        assert!(matches!(
            locks.check_lock_status("ghost").await,
            Err(AuthError::NotFound(_))
        ));
        assert!(matches!(
            locks.lock("ghost", 1).await,
            Err(AuthError::NotFound(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn lazy_expiry_keeps_a_concurrent_relock() -> anyhow::Result<()> {
        let store = Arc::new(RelockingStore {
            inner: MemoryStore::new(),
            relock_at: 11_000,
        });
        store
            .insert_account(&Account::new("a1".into(), "alice".into(), "x".into()))
            .await?;
        for at in 1..=3 {
            store.append_attempt("a1", Outcome::Failure, at, 10).await?;
        }
        let clock = Arc::new(ManualClock::new(10_000));
        let locks = LockManager::new(store.clone(), clock.clone());

        locks.lock("a1", 9_900).await?;
        assert_eq!(
            locks.check_lock_status("a1").await?,
            LockState::Locked { unlock_at: 11_000 }
        );
        let account = store.account_by_id("a1").await?;
        assert_eq!(account.and_then(|a| a.lock_until), Some(11_000));
        assert_eq!(store.inner.history_len("a1").await, 3);
        Ok(())
    }
}
