pub mod health;
pub use self::health::health;

pub mod history;
pub mod login;
pub mod logout;
pub mod root;

// common types and helpers for the handlers
use axum::{
    http::{
        header::{InvalidHeaderValue, COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

use crate::auth::AuthError;

pub const SESSION_COOKIE_NAME: &str = "session_id";
pub const SESSION_HEADER: &str = "x-session-id";
pub const USER_ID_HEADER: &str = "x-user-id";

/// Body rejected before reaching the auth core.
pub const CODE_BAD_BODY: u32 = 2;
/// Protected route called without any session token.
pub const CODE_SESSION_MISSING: u32 = 3101;
/// Protected route called with an unknown or expired token.
pub const CODE_SESSION_INVALID: u32 = 3102;

/// Error envelope shared by every endpoint.
#[derive(ToSchema, Serialize, Debug, PartialEq, Eq)]
pub struct ErrorBody {
    pub status: bool,
    pub message: String,
    pub error: u32,
}

impl ErrorBody {
    #[must_use]
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            status: false,
            message: message.into(),
            error: code,
        }
    }
}

/// Business errors are reported in the body with HTTP 200.
pub fn auth_error_response(err: &AuthError) -> Response {
    if let AuthError::Store(source) = err {
        error!("store failure: {source:#}");
    }
    (StatusCode::OK, Json(ErrorBody::new(err.code(), err.to_string()))).into_response()
}

pub fn unauthorized(code: u32, message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(ErrorBody::new(code, message))).into_response()
}

/// Session token from `X-Session-ID`, falling back to the `session_id` cookie.
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        return Some(token.to_string());
    }

    for header in headers.get_all(COOKIE) {
        let Ok(value) = header.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let mut parts = pair.trim().splitn(2, '=');
            let key = parts.next().map(str::trim);
            let val = parts.next().map(str::trim);
            if let (Some(SESSION_COOKIE_NAME), Some(val)) = (key, val) {
                if !val.is_empty() {
                    return Some(val.to_string());
                }
            }
        }
    }
    None
}

pub fn session_cookie(token: &str, ttl_seconds: i64) -> Result<HeaderValue, InvalidHeaderValue> {
    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; Secure; SameSite=Strict; Max-Age={ttl_seconds}"
    ))
}

#[must_use]
pub fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_static("session_id=; Path=/; HttpOnly; Secure; SameSite=Strict; Max-Age=0")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(SESSION_HEADER, HeaderValue::from_static("from-header"));
        headers.insert(COOKIE, HeaderValue::from_static("session_id=from-cookie"));
        assert_eq!(
            extract_session_token(&headers).as_deref(),
            Some("from-header")
        );
    }

    #[test]
    fn cookie_is_found_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; session_id=abc123 ; lang=en"),
        );
        assert_eq!(extract_session_token(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn empty_values_are_missing() {
        let mut headers = HeaderMap::new();
        headers.insert(SESSION_HEADER, HeaderValue::from_static("  "));
        headers.insert(COOKIE, HeaderValue::from_static("session_id="));
        assert_eq!(extract_session_token(&headers), None);
        assert_eq!(extract_session_token(&HeaderMap::new()), None);
    }

    #[test]
    fn cookie_attributes() -> Result<(), InvalidHeaderValue> {
        let cookie = session_cookie("tok", 600)?;
        assert_eq!(
            cookie.to_str().ok(),
            Some("session_id=tok; Path=/; HttpOnly; Secure; SameSite=Strict; Max-Age=600")
        );
        assert!(clear_session_cookie()
            .to_str()
            .is_ok_and(|value| value.ends_with("Max-Age=0")));
        Ok(())
    }

    #[test]
    fn error_body_shape() {
        let body = ErrorBody::new(CODE_SESSION_INVALID, "invalid or expired session");
        let json = serde_json::to_value(&body).unwrap_or_default();
        assert_eq!(
            json,
            serde_json::json!({"status": false, "message": "invalid or expired session", "error": 3102})
        );
    }
}
