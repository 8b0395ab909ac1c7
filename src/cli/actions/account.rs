use crate::{
    auth::{AuthConfig, AuthGate, CredentialCipher, SystemClock},
    cli::{actions::AddAccountArgs, globals::GlobalArgs},
    store::PgStore,
};
use anyhow::{Context, Result};
use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};

/// Handle the add-account action
/// # Errors
/// Returns an error if the database is unreachable or the account cannot be created.
pub async fn handle(args: AddAccountArgs, globals: &GlobalArgs) -> Result<()> {
    let cipher = CredentialCipher::new(globals.credential_key.expose_secret().as_bytes())
        .context("invalid --credential-key")?;

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(30))
        .connect(globals.dsn.expose_secret())
        .await
        .context("Failed to connect to database")?;

    let store = PgStore::new(pool);
    store.migrate().await.context("Failed to apply schema")?;

    let gate = AuthGate::new(
        Arc::new(store),
        Arc::new(SystemClock),
        cipher,
        AuthConfig::new(),
    );

    let account_id = gate
        .register(&args.user_name, args.password.expose_secret(), args.policy)
        .await
        .with_context(|| format!("Failed to create account {}", args.user_name))?;

    println!("{account_id}");

    Ok(())
}
