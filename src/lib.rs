//! # ovpanel (panel authentication core)
//!
//! `ovpanel` guards the OpenVPN management panel API. It owns two pieces of
//! state for every panel account: a bounded login history used for brute-force
//! lockout, and a single in-line session token that every other API call is
//! checked against.
//!
//! ## Lockout
//!
//! Each login attempt is appended to `login_history`, which never holds more
//! than ten rows per account. A failed login evaluates the most recent
//! `fail_threshold` rows; an unbroken streak of failures whose oldest row is
//! still inside the lockout window locks the account until
//! `now + lock_duration_seconds`. Expired locks are cleared lazily on the next
//! check, never by a timer.
//!
//! ## Sessions
//!
//! A successful login overwrites the account's session token, so only the most
//! recent login is ever valid. Validation is a stateless expiry comparison; it
//! never extends the session.
//!
//! ## Known weaknesses
//!
//! - Credentials are stored with reversible AES-128-CFB encryption, not a
//!   one-way hash.
//! - Protected routes accept requests without any session token and run them
//!   as a fixed fallback identity unless the server is started with
//!   `--require-session`.

pub mod api;
pub mod auth;
pub mod cli;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
