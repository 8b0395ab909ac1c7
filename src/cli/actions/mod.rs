pub mod account;
pub mod server;

use crate::auth::AccountPolicy;

#[derive(Debug)]
pub enum Action {
    Server(ServerArgs),
    AddAccount(AddAccountArgs),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerArgs {
    pub port: u16,
    pub fail_threshold: i64,
    pub lockout_window_seconds: i64,
    pub lock_duration_seconds: i64,
    pub session_ttl_seconds: i64,
    pub history_retention_days: i64,
    pub history_sweep_interval_seconds: u64,
    pub default_user: String,
    pub require_session: bool,
}

pub struct AddAccountArgs {
    pub user_name: String,
    pub password: secrecy::SecretString,
    pub policy: AccountPolicy,
}

impl std::fmt::Debug for AddAccountArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddAccountArgs")
            .field("user_name", &self.user_name)
            .field("password", &"***")
            .field("policy", &self.policy)
            .finish()
    }
}
