use super::{auth_error_response, clear_session_cookie, extract_session_token, ErrorBody};
use crate::auth::{AuthError, AuthGate};
use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LogoutResponse {
    pub status: bool,
    pub message: String,
}

#[utoipa::path(
    post,
    path= "/logout",
    params(
        ("X-Session-ID" = Option<String>, Header, description = "Session token; the session_id cookie is used when absent"),
    ),
    responses (
        (status = 200, description = "Session ended and cookie cleared", body = LogoutResponse),
        (status = 200, description = "Rejected: 3 no token, 4 unknown token, 8 store error", body = ErrorBody),
    ),
    tag= "auth"
)]
pub async fn logout(gate: Extension<Arc<AuthGate>>, headers: HeaderMap) -> Response {
    let mut response_headers = HeaderMap::new();
    response_headers.insert(SET_COOKIE, clear_session_cookie());

    let result = match extract_session_token(&headers) {
        Some(token) => gate.logout(&token).await,
        None => Err(AuthError::validation("session token is required")),
    };

    match result {
        Ok(()) => (
            StatusCode::OK,
            response_headers,
            Json(LogoutResponse {
                status: true,
                message: "logged out".to_string(),
            }),
        )
            .into_response(),
        Err(err) => (response_headers, auth_error_response(&err)).into_response(),
    }
}
