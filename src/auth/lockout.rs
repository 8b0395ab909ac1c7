//! Brute-force lockout decision over recent login history.

use std::sync::Arc;

use super::{clock::Clock, error::AuthResult};
use crate::store::{AuthStore, LoginAttempt, Outcome};

/// Resolved lockout knobs for one account.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LockoutPolicy {
    /// Consecutive failures that trigger a lock. Not positive: never lock.
    pub fail_threshold: i64,
    /// Oldest failure of the streak must be at most this old.
    pub lockout_window_seconds: i64,
    pub lock_duration_seconds: i64,
}

/// Leading run of failures in a newest-first slice.
#[must_use]
pub fn failure_streak(newest_first: &[LoginAttempt]) -> &[LoginAttempt] {
    let len = newest_first
        .iter()
        .take_while(|attempt| attempt.outcome == Outcome::Failure)
        .count();
    &newest_first[..len]
}

/// Lock deadline if `newest_first` (at most `fail_threshold` rows) warrants one.
#[must_use]
pub fn lock_deadline(
    newest_first: &[LoginAttempt],
    policy: &LockoutPolicy,
    now: i64,
) -> Option<i64> {
    if policy.fail_threshold <= 0 {
        return None;
    }
    let streak = failure_streak(newest_first);
    if i64::try_from(streak.len()).unwrap_or(i64::MAX) < policy.fail_threshold {
        return None;
    }
    let oldest = streak.last()?;
    let window_end = oldest
        .occurred_at
        .saturating_add(policy.lockout_window_seconds);
    (now <= window_end).then(|| now.saturating_add(policy.lock_duration_seconds))
}

#[derive(Clone)]
pub struct LockoutEvaluator {
    store: Arc<dyn AuthStore>,
    clock: Arc<dyn Clock>,
}

impl LockoutEvaluator {
    #[must_use]
    pub fn new(store: Arc<dyn AuthStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Returns `Some(unlock_at)` when the account's latest `fail_threshold`
    /// attempts are all failures and the oldest of them is inside the window.
    ///
    /// # Errors
    /// `Store` if history cannot be read.
    pub async fn evaluate(
        &self,
        account_id: &str,
        policy: &LockoutPolicy,
    ) -> AuthResult<Option<i64>> {
        if policy.fail_threshold <= 0 {
            return Ok(None);
        }
        let rows = self
            .store
            .recent_attempts(account_id, policy.fail_threshold)
            .await?;
        Ok(lock_deadline(&rows, policy, self.clock.now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLICY: LockoutPolicy = LockoutPolicy {
        fail_threshold: 3,
        lockout_window_seconds: 60,
        lock_duration_seconds: 900,
    };

    /// Build newest-first rows from oldest-first `(time, outcome)` pairs.
    fn rows(oldest_first: &[(i64, Outcome)]) -> Vec<LoginAttempt> {
        let mut rows: Vec<LoginAttempt> = oldest_first
            .iter()
            .zip(1..)
            .map(|(&(occurred_at, outcome), id)| LoginAttempt {
                id,
                account_id: "a1".into(),
                occurred_at,
                outcome,
            })
            .collect();
        rows.reverse();
        rows
    }

    #[test]
    fn streak_stops_at_first_success() {
        use Outcome::{Failure as F, Success as S};
        let history = rows(&[(1, F), (2, F), (3, S), (4, F)]);
        assert_eq!(failure_streak(&history).len(), 1);
        assert!(failure_streak(&rows(&[(1, S)])).is_empty());
        assert!(failure_streak(&[]).is_empty());
    }

    #[test]
    fn interrupted_streak_never_locks() {
        use Outcome::{Failure as F, Success as S};
        // Query LIMIT is the threshold, so only the newest three are seen.
        let history = rows(&[(100, F), (101, F), (102, S), (103, F)]);
        let newest: Vec<_> = history.into_iter().take(3).collect();
        assert_eq!(lock_deadline(&newest, &POLICY, 104), None);
    }

    #[test]
    fn threshold_failures_in_window_lock() {
        let history = rows(&[
            (100, Outcome::Failure),
            (110, Outcome::Failure),
            (120, Outcome::Failure),
        ]);
        assert_eq!(lock_deadline(&history, &POLICY, 120), Some(1_020));
    }

    #[test]
    fn window_is_inclusive_of_its_end() {
        let history = rows(&[
            (100, Outcome::Failure),
            (150, Outcome::Failure),
            (160, Outcome::Failure),
        ]);
        // Window end is 100 + 60.
        assert_eq!(lock_deadline(&history, &POLICY, 160), Some(1_060));
        assert_eq!(lock_deadline(&history, &POLICY, 161), None);
    }

    #[test]
    fn too_few_failures_do_not_lock() {
        let history = rows(&[(100, Outcome::Failure), (101, Outcome::Failure)]);
        assert_eq!(lock_deadline(&history, &POLICY, 101), None);
    }

    #[test]
    fn non_positive_threshold_never_locks() {
        let policy = LockoutPolicy {
            fail_threshold: 0,
            ..POLICY
        };
        let history = rows(&[(100, Outcome::Failure)]);
        assert_eq!(lock_deadline(&history, &policy, 100), None);
    }
}
