use crate::{
    api::{self, AnonymousPolicy, ServerSettings},
    auth::{AuthConfig, CredentialCipher},
    cli::{actions::ServerArgs, globals::GlobalArgs},
};
use anyhow::{Context, Result};
use secrecy::ExposeSecret;

#[must_use]
pub fn auth_config(args: &ServerArgs) -> AuthConfig {
    AuthConfig::new()
        .with_fail_threshold(args.fail_threshold)
        .with_lockout_window_seconds(args.lockout_window_seconds)
        .with_lock_duration_seconds(args.lock_duration_seconds)
        .with_session_ttl_seconds(args.session_ttl_seconds)
        .with_history_retention_days(args.history_retention_days)
        .with_history_sweep_interval_seconds(args.history_sweep_interval_seconds)
}

#[must_use]
pub fn anonymous_policy(args: &ServerArgs) -> AnonymousPolicy {
    if args.require_session {
        AnonymousPolicy::Reject
    } else {
        AnonymousPolicy::fallback_for(&args.default_user)
    }
}

/// Handle the server action
/// # Errors
/// Returns an error if the credential key is invalid or the server fails.
pub async fn handle(args: ServerArgs, globals: &GlobalArgs) -> Result<()> {
    let cipher = CredentialCipher::new(globals.credential_key.expose_secret().as_bytes())
        .context("invalid --credential-key")?;

    api::new(ServerSettings {
        port: args.port,
        dsn: globals.dsn.expose_secret().to_string(),
        cipher,
        auth_config: auth_config(&args),
        anonymous: anonymous_policy(&args),
    })
    .await
}
