use super::{auth_error_response, session_cookie, ErrorBody, CODE_BAD_BODY};
use crate::auth::AuthGate;
use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, instrument};
use utoipa::ToSchema;

#[derive(ToSchema, Deserialize)]
pub struct LoginRequest {
    user_name: String,
    user_passwd: String,
}

// Keep passwords out of request spans.
impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("user_name", &self.user_name)
            .field("user_passwd", &"***")
            .finish()
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub status: bool,
    pub message: String,
    pub user_id: String,
    pub session_id: String,
}

#[utoipa::path(
    post,
    path= "/check_users_login",
    request_body = LoginRequest,
    responses (
        (status = 200, description = "Session issued; the session_id cookie is set", body = LoginResponse),
        (status = 200, description = "Rejected: 2 bad body, 3 missing fields, 5 bad credentials, 7 locked, 8 store error", body = ErrorBody),
    ),
    tag= "auth"
)]
#[instrument(skip(gate))]
pub async fn login(
    gate: Extension<Arc<AuthGate>>,
    payload: Option<Json<LoginRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return (
            StatusCode::OK,
            Json(ErrorBody::new(CODE_BAD_BODY, "invalid JSON body")),
        )
            .into_response();
    };

    let grant = match gate.login(&request.user_name, &request.user_passwd).await {
        Ok(grant) => grant,
        Err(err) => return auth_error_response(&err),
    };

    let mut headers = HeaderMap::new();
    match session_cookie(&grant.session_token, grant.ttl_seconds) {
        Ok(cookie) => {
            headers.insert(SET_COOKIE, cookie);
        }
        Err(err) => error!("Failed to build session cookie: {err}"),
    }

    let body = LoginResponse {
        status: true,
        message: "login successful".to_string(),
        user_id: grant.account_id,
        session_id: grant.session_token,
    };

    (StatusCode::OK, headers, Json(body)).into_response()
}
