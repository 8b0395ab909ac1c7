use crate::{
    auth::AccountPolicy,
    cli::{
        actions::{Action, AddAccountArgs, ServerArgs},
        globals::GlobalArgs,
    },
};
use anyhow::{anyhow, Result};
use clap::ArgMatches;
use secrecy::SecretString;

fn required_secret(matches: &ArgMatches, name: &str) -> Result<SecretString> {
    matches
        .get_one::<String>(name)
        .map(|value| SecretString::from(value.clone()))
        .ok_or_else(|| anyhow!("missing required argument: --{name}"))
}

fn required<T: Clone + Send + Sync + 'static>(matches: &ArgMatches, name: &str) -> Result<T> {
    matches
        .get_one::<T>(name)
        .cloned()
        .ok_or_else(|| anyhow!("missing required argument: --{name}"))
}

/// Turn parsed arguments into the action to run plus its shared arguments.
///
/// # Errors
/// Returns an error if `--dsn` or `--credential-key` is missing.
pub fn handler(matches: &ArgMatches) -> Result<(Action, GlobalArgs)> {
    let action = match matches.subcommand() {
        Some(("add-account", sub_m)) => {
            let globals = GlobalArgs::new(
                required_secret(sub_m, "dsn")?,
                required_secret(sub_m, "credential-key")?,
            );
            let action = Action::AddAccount(AddAccountArgs {
                user_name: required(sub_m, "user-name")?,
                password: required_secret(sub_m, "password")?,
                policy: AccountPolicy {
                    fail_threshold: sub_m.get_one::<i64>("fail-threshold").copied(),
                    fail_window_seconds: sub_m.get_one::<i64>("fail-window").copied(),
                    lock_duration_seconds: sub_m.get_one::<i64>("lock-duration").copied(),
                    session_ttl_seconds: sub_m.get_one::<i64>("session-ttl").copied(),
                },
            });
            return Ok((action, globals));
        }
        _ => Action::Server(ServerArgs {
            port: required(matches, "port")?,
            fail_threshold: required(matches, "fail-threshold")?,
            lockout_window_seconds: required(matches, "lockout-window")?,
            lock_duration_seconds: required(matches, "lock-duration")?,
            session_ttl_seconds: required(matches, "session-ttl")?,
            history_retention_days: required(matches, "history-retention-days")?,
            history_sweep_interval_seconds: required(matches, "history-sweep-interval")?,
            default_user: required(matches, "default-user")?,
            require_session: matches.get_flag("require-session"),
        }),
    };

    let globals = GlobalArgs::new(
        required_secret(matches, "dsn")?,
        required_secret(matches, "credential-key")?,
    );

    Ok((action, globals))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;
    use secrecy::ExposeSecret;

    const SERVER_VARS: [&str; 9] = [
        "OVPANEL_DSN",
        "OVPANEL_CREDENTIAL_KEY",
        "OVPANEL_PORT",
        "OVPANEL_FAIL_THRESHOLD",
        "OVPANEL_LOCKOUT_WINDOW",
        "OVPANEL_LOCK_DURATION",
        "OVPANEL_SESSION_TTL",
        "OVPANEL_DEFAULT_USER",
        "OVPANEL_REQUIRE_SESSION",
    ];

    #[test]
    fn server_action() -> Result<()> {
        temp_env::with_vars_unset(SERVER_VARS, || {
            let matches = commands::new().get_matches_from(vec![
                "ovpanel",
                "--dsn",
                "postgres://localhost/panel",
                "--credential-key",
                "0123456789abcdef",
                "--lockout-window",
                "60",
                "--require-session",
            ]);
            let (action, globals) = handler(&matches)?;
            let Action::Server(args) = action else {
                return Err(anyhow!("expected server action"));
            };
            assert_eq!(args.port, 8080);
            assert_eq!(args.lockout_window_seconds, 60);
            assert_eq!(args.lock_duration_seconds, 900);
            assert_eq!(args.history_sweep_interval_seconds, 3600);
            assert!(args.require_session);
            assert_eq!(globals.dsn.expose_secret(), "postgres://localhost/panel");
            Ok(())
        })
    }

    #[test]
    fn missing_dsn_is_an_error() {
        temp_env::with_vars_unset(SERVER_VARS, || {
            let matches = commands::new().get_matches_from(vec![
                "ovpanel",
                "--credential-key",
                "0123456789abcdef",
            ]);
            assert!(handler(&matches).is_err());
        });
    }

    #[test]
    fn add_account_action() -> Result<()> {
        temp_env::with_vars(
            [
                ("OVPANEL_DSN", Some("postgres://localhost/panel")),
                ("OVPANEL_CREDENTIAL_KEY", Some("0123456789abcdef")),
                ("OVPANEL_ACCOUNT_PASSWORD", None),
            ],
            || {
                let matches = commands::new().get_matches_from(vec![
                    "ovpanel",
                    "add-account",
                    "--user-name",
                    "alice",
                    "--password",
                    "hunter2",
                    "--session-ttl",
                    "120",
                ]);
                let (action, _globals) = handler(&matches)?;
                let Action::AddAccount(args) = action else {
                    return Err(anyhow!("expected add-account action"));
                };
                assert_eq!(args.user_name, "alice");
                assert_eq!(args.password.expose_secret(), "hunter2");
                assert_eq!(args.policy.session_ttl_seconds, Some(120));
                assert_eq!(args.policy.fail_threshold, None);
                Ok(())
            },
        )
    }
}
