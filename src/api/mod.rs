use crate::{
    api::handlers::{health, history, login, logout, root},
    auth::{AuthConfig, AuthGate, CredentialCipher, SystemClock},
    store::PgStore,
};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    middleware::from_fn_with_state,
    response::Json,
    routing::{get, post},
    Extension, Router,
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{info, info_span, warn, Span};
use ulid::Ulid;

pub mod handlers;
pub mod maintenance;
pub mod middleware;
mod openapi;

pub use self::middleware::{AnonymousPolicy, CurrentAccount, SessionGuard};
pub use self::openapi::openapi;

/// Build the HTTP router around an [`AuthGate`].
#[must_use]
pub fn router(gate: Arc<AuthGate>, anonymous: AnonymousPolicy) -> Router {
    let guard = SessionGuard::new(gate.clone(), anonymous);

    let protected = Router::new()
        .route("/login_history", get(history::login_history))
        .route_layer(from_fn_with_state(guard, SessionGuard::middleware));

    Router::new()
        .route("/", get(root::root))
        .route("/health", get(health::health))
        .route("/openapi.json", get(|| async { Json(openapi()) }))
        .route("/check_users_login", post(login::login))
        .route("/logout", get(logout::logout).post(logout::logout))
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(gate)),
        )
}

/// Runtime settings for [`new`].
pub struct ServerSettings {
    pub port: u16,
    pub dsn: String,
    pub cipher: CredentialCipher,
    pub auth_config: AuthConfig,
    pub anonymous: AnonymousPolicy,
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(settings: ServerSettings) -> Result<()> {
    let ServerSettings {
        port,
        dsn,
        cipher,
        auth_config,
        anonymous,
    } = settings;

    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    let store = PgStore::new(pool);
    store.migrate().await.context("Failed to apply schema")?;

    let sweep_interval = Duration::from_secs(auth_config.history_sweep_interval_seconds());
    let retention_days = auth_config.history_retention_days();

    let gate = Arc::new(AuthGate::new(
        Arc::new(store),
        Arc::new(SystemClock),
        cipher,
        auth_config,
    ));

    if let AnonymousPolicy::Fallback(account_id) = &anonymous {
        warn!(
            fallback_account_id = %account_id,
            "protected routes accept requests without a session token; start with --require-session to reject them"
        );
    }

    maintenance::spawn_history_sweeper(gate.history_log().clone(), retention_days, sweep_interval);

    let app = router(gate, anonymous);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {err}");
                std::future::pending::<()>().await;
            }
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
