use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ArgAction, ColorChoice, Command,
};
use std::sync::OnceLock;

use crate::auth::MAX_HISTORY_PER_ACCOUNT;

pub mod logging;

fn long_version() -> &'static str {
    static LONG_VERSION: OnceLock<String> = OnceLock::new();
    LONG_VERSION.get_or_init(|| {
        format!(
            "{} (commit {})",
            env!("CARGO_PKG_VERSION"),
            crate::GIT_COMMIT_HASH
        )
    })
}

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new("ovpanel")
        .about("OpenVPN panel authentication gate")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version())
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("dsn")
                .short('d')
                .long("dsn")
                .help("Database connection string")
                .env("OVPANEL_DSN")
                .global(true)
                .hide_env_values(true),
        )
        .arg(
            Arg::new("credential-key")
                .long("credential-key")
                .help("16-byte key used to encrypt stored passwords")
                .env("OVPANEL_CREDENTIAL_KEY")
                .global(true)
                .hide_env_values(true),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("OVPANEL_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("fail-threshold")
                .long("fail-threshold")
                .help("Consecutive failed logins that lock an account")
                .default_value("5")
                .env("OVPANEL_FAIL_THRESHOLD")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_HISTORY_PER_ACCOUNT)),
        )
        .arg(
            Arg::new("lockout-window")
                .long("lockout-window")
                .help("Seconds the failure streak must fit in to trigger a lock")
                .default_value("300")
                .env("OVPANEL_LOCKOUT_WINDOW")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new("lock-duration")
                .long("lock-duration")
                .help("Seconds an account stays locked")
                .default_value("900")
                .env("OVPANEL_LOCK_DURATION")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new("session-ttl")
                .long("session-ttl")
                .help("Session lifetime in seconds")
                .default_value("600")
                .env("OVPANEL_SESSION_TTL")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new("history-retention-days")
                .long("history-retention-days")
                .help("Login history older than this many days is purged")
                .default_value("90")
                .env("OVPANEL_HISTORY_RETENTION_DAYS")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new("history-sweep-interval")
                .long("history-sweep-interval")
                .help("Seconds between login history purges")
                .default_value("3600")
                .env("OVPANEL_HISTORY_SWEEP_INTERVAL")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("default-user")
                .long("default-user")
                .help("User name whose MD5 digest identifies requests without a session")
                .default_value("user")
                .env("OVPANEL_DEFAULT_USER"),
        )
        .arg(
            Arg::new("require-session")
                .long("require-session")
                .help("Reject protected requests that carry no session token")
                .env("OVPANEL_REQUIRE_SESSION")
                .action(ArgAction::SetTrue),
        )
        .arg(logging::verbosity_arg())
        .subcommand(add_account())
}

fn add_account() -> Command {
    Command::new("add-account")
        .about("Create a panel account")
        .arg(
            Arg::new("user-name")
                .long("user-name")
                .help("Login name")
                .required(true),
        )
        .arg(
            Arg::new("password")
                .long("password")
                .help("Login password")
                .env("OVPANEL_ACCOUNT_PASSWORD")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new("fail-threshold")
                .long("fail-threshold")
                .help("Per-account failed login threshold")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_HISTORY_PER_ACCOUNT)),
        )
        .arg(
            Arg::new("fail-window")
                .long("fail-window")
                .help("Per-account lockout window in seconds")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new("lock-duration")
                .long("lock-duration")
                .help("Per-account lock duration in seconds")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new("session-ttl")
                .long("session-ttl")
                .help("Per-account session lifetime in seconds")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
}
