//! Session check in front of protected routes.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, error};

use super::handlers::{
    auth_error_response, extract_session_token, unauthorized, CODE_SESSION_INVALID,
    CODE_SESSION_MISSING, USER_ID_HEADER,
};
use crate::auth::{AuthGate, SessionState};

/// Account id the request runs as, set by [`SessionGuard::middleware`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CurrentAccount(pub String);

/// What to do with a protected request that carries no session token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnonymousPolicy {
    /// Run the request as this fixed account id.
    Fallback(String),
    /// Reject with 401.
    Reject,
}

impl AnonymousPolicy {
    /// Fallback identity derived from a default user name: its lowercase hex
    /// MD5 digest.
    #[must_use]
    pub fn fallback_for(default_user: &str) -> Self {
        Self::Fallback(format!("{:x}", md5::compute(default_user.as_bytes())))
    }
}

/// Middleware state; apply with `axum::middleware::from_fn_with_state`.
#[derive(Clone)]
pub struct SessionGuard {
    gate: Arc<AuthGate>,
    anonymous: AnonymousPolicy,
}

impl SessionGuard {
    #[must_use]
    pub fn new(gate: Arc<AuthGate>, anonymous: AnonymousPolicy) -> Self {
        Self { gate, anonymous }
    }

    /// Resolve the caller and overwrite `X-User-ID` before calling `next`.
    pub async fn middleware(
        State(guard): State<Self>,
        mut request: Request<Body>,
        next: Next,
    ) -> Response {
        let account_id = match extract_session_token(request.headers()) {
            Some(token) => match guard.gate.validate(&token).await {
                Ok(SessionState::Active { account_id }) => account_id,
                Ok(state) => {
                    debug!(?state, "rejected session token");
                    return unauthorized(CODE_SESSION_INVALID, "invalid or expired session");
                }
                Err(err) => return auth_error_response(&err),
            },
            None => match &guard.anonymous {
                AnonymousPolicy::Fallback(account_id) => account_id.clone(),
                AnonymousPolicy::Reject => {
                    return unauthorized(CODE_SESSION_MISSING, "session token is required");
                }
            },
        };

        match HeaderValue::from_str(&account_id) {
            Ok(value) => {
                request
                    .headers_mut()
                    .insert(HeaderName::from_static(USER_ID_HEADER), value);
            }
            Err(err) => {
                error!("account id is not a valid header value: {err}");
                request.headers_mut().remove(USER_ID_HEADER);
            }
        }
        request.extensions_mut().insert(CurrentAccount(account_id));

        next.run(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_identity_is_md5_of_default_user() {
        assert_eq!(
            AnonymousPolicy::fallback_for("user"),
            AnonymousPolicy::Fallback("ee11cbb19052e40b07aac0ca060c23ee".to_string())
        );
    }
}
