use super::handlers::{health, history, login, logout};
use utoipa::OpenApi;

// Title, version, description, contact and license come from Cargo.toml.
#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        login::login,
        logout::logout,
        history::login_history,
    ),
    tags(
        (name = "auth", description = "Panel login, logout and login history"),
        (name = "health", description = "Service and database status"),
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
