//! Single in-line session per account.
//!
//! A new login overwrites the previous token. Validation only compares the
//! stored expiry against the clock and never extends it. Logout sets the
//! expiry to "now", so the token stops validating once the clock moves past
//! that second.

use anyhow::Context;
use rand::{rngs::OsRng, RngCore};
use std::sync::Arc;
use tracing::debug;

use super::{
    clock::Clock,
    error::{AuthError, AuthResult},
};
use crate::store::{AuthStore, SessionGrant};

const TOKEN_BYTES: usize = 16;

/// Result of looking a token up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    Active { account_id: String },
    Expired { account_id: String },
    Unknown,
}

impl SessionState {
    /// Account id of a valid session.
    #[must_use]
    pub fn account_id(&self) -> Option<&str> {
        match self {
            Self::Active { account_id } => Some(account_id),
            Self::Expired { .. } | Self::Unknown => None,
        }
    }

    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Active { .. })
    }
}

/// 128-bit random token, lowercase hex.
///
/// # Errors
/// Returns an error if the OS RNG fails.
pub fn generate_token() -> anyhow::Result<String> {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session token")?;
    Ok(hex::encode(bytes))
}

#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn AuthStore>,
    clock: Arc<dyn Clock>,
}

impl SessionManager {
    #[must_use]
    pub fn new(store: Arc<dyn AuthStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Issue a token valid for `ttl_seconds`, replacing any previous session.
    ///
    /// # Errors
    /// `Validation` for a non-positive TTL, `NotFound` for an unknown account,
    /// `Store` on store failure.
    pub async fn create(&self, account_id: &str, ttl_seconds: i64) -> AuthResult<String> {
        if ttl_seconds <= 0 {
            return Err(AuthError::validation("session ttl must be positive"));
        }
        let grant = SessionGrant {
            token: generate_token()?,
            ttl_seconds,
            expires_at: self.clock.now().saturating_add(ttl_seconds),
        };
        if !self.store.set_session(account_id, &grant).await? {
            return Err(AuthError::NotFound("account"));
        }
        debug!(account_id, expires_at = grant.expires_at, "session issued");
        Ok(grant.token)
    }

    /// # Errors
    /// `Store` on store failure. Unknown and expired tokens are not errors.
    pub async fn validate(&self, token: &str) -> AuthResult<SessionState> {
        if token.is_empty() {
            return Ok(SessionState::Unknown);
        }
        let Some(account) = self.store.account_by_session(token).await? else {
            return Ok(SessionState::Unknown);
        };
        let expires_at = account.session_expires_at.unwrap_or(0);
        if expires_at < self.clock.now() {
            Ok(SessionState::Expired {
                account_id: account.account_id,
            })
        } else {
            Ok(SessionState::Active {
                account_id: account.account_id,
            })
        }
    }

    /// Mark the holder inactive and expire the token now. The row is kept.
    ///
    /// # Errors
    /// `NotFound` for an unknown token, `Store` on store failure.
    pub async fn invalidate(&self, token: &str) -> AuthResult<()> {
        if token.is_empty() || !self.store.end_session(token, self.clock.now()).await? {
            return Err(AuthError::NotFound("session"));
        }
        Ok(())
    }
}
