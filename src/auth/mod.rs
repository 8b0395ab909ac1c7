//! Authentication core: login history, lockout, locks and sessions.

pub mod clock;
pub mod config;
pub mod credential;
pub mod error;
pub mod gate;
pub mod history;
pub mod lock;
pub mod lockout;
pub mod session;

pub use self::{
    clock::{Clock, ManualClock, SystemClock},
    config::AuthConfig,
    credential::CredentialCipher,
    error::{AuthError, AuthResult},
    gate::{AccountPolicy, AuthGate, LoginGrant},
    history::{HistoryListing, LoginHistoryLog, MAX_HISTORY_PER_ACCOUNT, PAGE_SIZE},
    lock::{LockManager, LockState},
    lockout::{LockoutEvaluator, LockoutPolicy},
    session::{SessionManager, SessionState},
};
