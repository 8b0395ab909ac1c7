use super::{auth_error_response, ErrorBody};
use crate::{
    api::middleware::CurrentAccount,
    auth::AuthGate,
    store::LoginAttempt,
};
use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, Debug, IntoParams)]
pub struct HistoryQuery {
    /// 1-based page; values below 1 are served as page 1.
    page: Option<i64>,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct HistoryResponse {
    pub status: bool,
    pub message: String,
    pub page: i64,
    pub total: i64,
    pub records: Vec<LoginAttempt>,
}

#[utoipa::path(
    get,
    path= "/login_history",
    params(HistoryQuery),
    responses (
        (status = 200, description = "Newest-first login history of the calling account, 50 rows per page", body = HistoryResponse),
        (status = 200, description = "Store error (8)", body = ErrorBody),
        (status = 401, description = "Missing (3101) or invalid (3102) session", body = ErrorBody),
    ),
    tag= "auth"
)]
pub async fn login_history(
    gate: Extension<Arc<AuthGate>>,
    Extension(CurrentAccount(account_id)): Extension<CurrentAccount>,
    query: Option<Query<HistoryQuery>>,
) -> Response {
    let page = query.and_then(|Query(query)| query.page).unwrap_or(1);

    match gate.history(&account_id, page).await {
        Ok(listing) => (
            StatusCode::OK,
            Json(HistoryResponse {
                status: true,
                message: "ok".to_string(),
                page: listing.page,
                total: listing.total,
                records: listing.rows,
            }),
        )
            .into_response(),
        Err(err) => auth_error_response(&err),
    }
}
