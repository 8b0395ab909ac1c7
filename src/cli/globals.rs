use secrecy::SecretString;
use std::fmt;

/// Arguments shared by every action.
#[derive(Clone)]
pub struct GlobalArgs {
    pub dsn: SecretString,
    pub credential_key: SecretString,
}

impl fmt::Debug for GlobalArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalArgs")
            .field("dsn", &"***")
            .field("credential_key", &"***")
            .finish()
    }
}

impl GlobalArgs {
    #[must_use]
    pub fn new(dsn: SecretString, credential_key: SecretString) -> Self {
        Self {
            dsn,
            credential_key,
        }
    }
}
