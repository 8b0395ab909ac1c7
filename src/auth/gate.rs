//! Login and logout flow over the history, lockout, lock and session parts.

use std::sync::Arc;
use tracing::{info, warn};

use super::{
    clock::Clock,
    config::AuthConfig,
    credential::CredentialCipher,
    error::{AuthError, AuthResult},
    history::{HistoryListing, LoginHistoryLog, MAX_HISTORY_PER_ACCOUNT},
    lock::{LockManager, LockState},
    lockout::LockoutEvaluator,
    session::{generate_token, SessionManager, SessionState},
};
use crate::store::{Account, AuthStore, InsertOutcome, Outcome};

/// Issued by a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginGrant {
    pub account_id: String,
    pub session_token: String,
    pub ttl_seconds: i64,
}

/// Per-account policy overrides for a new account. `None` uses the server
/// default.
#[derive(Debug, Clone, Default)]
pub struct AccountPolicy {
    pub fail_threshold: Option<i64>,
    pub fail_window_seconds: Option<i64>,
    pub lock_duration_seconds: Option<i64>,
    pub session_ttl_seconds: Option<i64>,
}

#[derive(Clone)]
pub struct AuthGate {
    store: Arc<dyn AuthStore>,
    config: AuthConfig,
    cipher: CredentialCipher,
    history: LoginHistoryLog,
    evaluator: LockoutEvaluator,
    locks: LockManager,
    sessions: SessionManager,
}

impl AuthGate {
    #[must_use]
    pub fn new(
        store: Arc<dyn AuthStore>,
        clock: Arc<dyn Clock>,
        cipher: CredentialCipher,
        config: AuthConfig,
    ) -> Self {
        Self {
            history: LoginHistoryLog::new(store.clone(), clock.clone()),
            evaluator: LockoutEvaluator::new(store.clone(), clock.clone()),
            locks: LockManager::new(store.clone(), clock.clone()),
            sessions: SessionManager::new(store.clone(), clock),
            store,
            config,
            cipher,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub const fn history_log(&self) -> &LoginHistoryLog {
        &self.history
    }

    #[must_use]
    pub const fn locks(&self) -> &LockManager {
        &self.locks
    }

    #[must_use]
    pub const fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// # Errors
    /// `Validation` for empty input, `Credential` for an unknown user or wrong
    /// password, `Locked` while the account is locked or when this failure
    /// locks it, `Store` on store failure.
    pub async fn login(&self, user_name: &str, password: &str) -> AuthResult<LoginGrant> {
        if user_name.is_empty() || password.is_empty() {
            return Err(AuthError::validation("user name and password are required"));
        }
        let Some(account) = self.store.account_by_name(user_name).await? else {
            return Err(AuthError::Credential);
        };
        let account_id = account.account_id.as_str();

        // Locked accounts are rejected before the credential or history is touched.
        if let LockState::Locked { unlock_at } = self.locks.check_lock_status(account_id).await? {
            warn!(account_id, unlock_at, "login rejected: account locked");
            return Err(AuthError::Locked { unlock_at });
        }

        let verified = self.cipher.verify(&account.credential, password);
        self.history
            .record(account_id, Outcome::from_verified(verified))
            .await?;

        if !verified {
            let policy = self.config.policy_for(&account);
            if let Some(unlock_at) = self.evaluator.evaluate(account_id, &policy).await? {
                self.locks.lock(account_id, unlock_at).await?;
                warn!(
                    account_id,
                    unlock_at,
                    threshold = policy.fail_threshold,
                    "too many failed logins, account locked"
                );
                return Err(AuthError::Locked { unlock_at });
            }
            return Err(AuthError::Credential);
        }

        self.locks.unlock(account_id, true).await?;
        let ttl_seconds = self.config.session_ttl_for(&account);
        let session_token = self.sessions.create(account_id, ttl_seconds).await?;
        info!(account_id, "login succeeded");

        Ok(LoginGrant {
            account_id: account.account_id,
            session_token,
            ttl_seconds,
        })
    }

    /// # Errors
    /// `NotFound` for an unknown token, `Store` on store failure.
    pub async fn logout(&self, token: &str) -> AuthResult<()> {
        self.sessions.invalidate(token).await
    }

    /// # Errors
    /// `Store` on store failure.
    pub async fn validate(&self, token: &str) -> AuthResult<SessionState> {
        self.sessions.validate(token).await
    }

    /// Create an account with an encrypted credential. Returns its id.
    ///
    /// # Errors
    /// `Validation` for empty input, a taken user name or a fail threshold
    /// above [`MAX_HISTORY_PER_ACCOUNT`], `Store` on store or cipher failure.
    pub async fn register(
        &self,
        user_name: &str,
        password: &str,
        policy: AccountPolicy,
    ) -> AuthResult<String> {
        if user_name.is_empty() || password.is_empty() {
            return Err(AuthError::validation("user name and password are required"));
        }
        if policy
            .fail_threshold
            .is_some_and(|threshold| threshold > MAX_HISTORY_PER_ACCOUNT)
        {
            return Err(AuthError::validation(format!(
                "fail threshold must be at most {MAX_HISTORY_PER_ACCOUNT}"
            )));
        }
        let mut account = Account::new(
            generate_token()?,
            user_name.to_string(),
            self.cipher.encrypt(password)?,
        );
        account.fail_threshold = policy.fail_threshold;
        account.fail_window_seconds = policy.fail_window_seconds;
        account.lock_duration_seconds = policy.lock_duration_seconds;
        account.session_ttl_seconds = policy.session_ttl_seconds;

        match self.store.insert_account(&account).await? {
            InsertOutcome::Created => {
                info!(account_id = %account.account_id, user_name, "account created");
                Ok(account.account_id)
            }
            InsertOutcome::Conflict => Err(AuthError::validation(format!(
                "user name {user_name} already exists"
            ))),
        }
    }

    /// # Errors
    /// `Store` on store failure.
    pub async fn history(&self, account_id: &str, page: i64) -> AuthResult<HistoryListing> {
        self.history.list_recent(account_id, page).await
    }

    /// # Errors
    /// Returns an error when the store cannot be reached.
    pub async fn ping(&self) -> anyhow::Result<()> {
        self.store.ping().await
    }
}
