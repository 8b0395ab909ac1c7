use thiserror::Error;

/// Domain errors surfaced by the auth components.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("account is locked until {unlock_at}")]
    Locked { unlock_at: i64 },
    /// Wrong password and unknown user name look the same to callers.
    #[error("invalid user name or password")]
    Credential,
    #[error("store unavailable: {0:#}")]
    Store(#[from] anyhow::Error),
}

impl AuthError {
    /// Code carried in the `error` field of the JSON envelope.
    #[must_use]
    pub const fn code(&self) -> u32 {
        match self {
            Self::Validation(_) => 3,
            Self::NotFound(_) => 4,
            Self::Credential => 5,
            Self::Locked { .. } => 7,
            Self::Store(_) => 8,
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

pub type AuthResult<T> = Result<T, AuthError>;
