//! # apiworks HTTP API Module
//!
//! JSON over HTTP with axum. Every resource (workspace, environment,
//! variable, credential) exposes:
//!
//! - `POST /api/<resource>/collection` - snapshot of what the caller can see
//! - `POST /api/<resource>/insert` - batch create (`{"items": [...]}`)
//! - `POST /api/<resource>/update` - batch update by ID
//! - `POST /api/<resource>/delete` - batch delete by ID (`{"ids": [...]}`)
//! - `GET /api/<resource>/sync` - Server-Sent Events, one per mutation
//!
//! Plus:
//!
//! - `POST /api/credential/secret/{insert,update,get}`
//! - `POST /api/environment/move`, `POST /api/variable/move`
//! - `POST /api/bundle/export`, `POST /api/bundle/import`
//! - `GET /health` - Health check, never authenticated
//!
//! Errors are `{"code": "...", "message": "..."}` with the codes of
//! [`crate::error::ApiError`].

mod auth;
mod handlers;
mod middleware;
mod types;

pub use auth::{Principal, TokenTable};
pub use middleware::{GlobalRateLimiter, create_rate_limiter};
pub use types::{
    ExportRequest, ExportResponse, HealthResponse, IdsRequest, ImportRequest, ItemsRequest,
    ItemsResponse, SyncQuery,
};

use crate::config::{AppConfig, CorsConfig};
use crate::error::AppError;
use crate::services::Services;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Largest accepted request body; bundles travel base64-encoded.
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

#[derive(Clone)]
/// Shared state handed to every handler.
pub struct AppState {
    pub services: Arc<Services>,
    pub tokens: Arc<TokenTable>,
}

impl AppState {
    #[must_use]
    pub fn new(services: Services, tokens: TokenTable) -> Self {
        Self {
            services: Arc::new(services),
            tokens: Arc::new(tokens),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// `*` allows every origin; no configuration allows localhost only.
fn build_cors_layer(config: &CorsConfig) -> CorsLayer {
    match config.origins.as_deref() {
        Some([wildcard]) if wildcard == "*" => {
            tracing::warn!("CORS: allowing ALL origins, do not use this in production");
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| match origin.parse::<HeaderValue>() {
                    Ok(value) => {
                        tracing::info!(origin = %origin, "CORS: allowing origin");
                        Some(value)
                    }
                    Err(e) => {
                        tracing::warn!(origin = %origin, error = %e, "CORS: invalid origin");
                        None
                    }
                })
                .collect();
            if allowed.is_empty() {
                tracing::warn!("CORS: no valid origins configured, defaulting to localhost only");
                build_localhost_cors()
            } else {
                restricted(allowed)
            }
        }
        None => build_localhost_cors(),
    }
}

fn build_localhost_cors() -> CorsLayer {
    let origins = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();
    restricted(origins)
}

fn restricted(origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Build the router with every endpoint and the middleware stack.
///
/// Middleware (outer to inner): tracing, CORS, body limit, rate limiting,
/// then bearer authentication on `/api` routes only.
pub fn create_router(state: AppState, config: &AppConfig) -> Router {
    if state.tokens.is_empty() {
        tracing::warn!(
            "no API tokens configured, every /api request will be rejected; \
             set APIWORKS_API_TOKEN and APIWORKS_API_USER or [[auth.tokens]]"
        );
    }

    let api = Router::new()
        // workspaces
        .route("/api/workspace/collection", post(handlers::workspace_collection))
        .route("/api/workspace/insert", post(handlers::workspace_insert))
        .route("/api/workspace/update", post(handlers::workspace_update))
        .route("/api/workspace/delete", post(handlers::workspace_delete))
        .route("/api/workspace/sync", get(handlers::workspace_sync))
        // environments
        .route("/api/environment/collection", post(handlers::environment_collection))
        .route("/api/environment/insert", post(handlers::environment_insert))
        .route("/api/environment/update", post(handlers::environment_update))
        .route("/api/environment/delete", post(handlers::environment_delete))
        .route("/api/environment/move", post(handlers::environment_move))
        .route("/api/environment/sync", get(handlers::environment_sync))
        // variables
        .route("/api/variable/collection", post(handlers::variable_collection))
        .route("/api/variable/insert", post(handlers::variable_insert))
        .route("/api/variable/update", post(handlers::variable_update))
        .route("/api/variable/delete", post(handlers::variable_delete))
        .route("/api/variable/move", post(handlers::variable_move))
        .route("/api/variable/sync", get(handlers::variable_sync))
        // credentials
        .route("/api/credential/collection", post(handlers::credential_collection))
        .route("/api/credential/insert", post(handlers::credential_insert))
        .route("/api/credential/update", post(handlers::credential_update))
        .route("/api/credential/delete", post(handlers::credential_delete))
        .route("/api/credential/sync", get(handlers::credential_sync))
        .route("/api/credential/secret/insert", post(handlers::secret_insert))
        .route("/api/credential/secret/update", post(handlers::secret_update))
        .route("/api/credential/secret/get", post(handlers::secret_get))
        // bundles
        .route("/api/bundle/export", post(handlers::bundle_export))
        .route("/api/bundle/import", post(handlers::bundle_import))
        .route_layer(axum_middleware::from_fn_with_state(
            Arc::clone(&state.tokens),
            auth::bearer_auth_middleware,
        ));

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .merge(api);

    let rate = config.limits.rate_per_second;
    if rate > 0 {
        tracing::info!(requests_per_second = rate, "rate limiting enabled");
        router = router.layer(axum_middleware::from_fn_with_state(
            create_rate_limiter(rate),
            middleware::rate_limit_middleware,
        ));
    } else {
        tracing::info!("rate limiting disabled");
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors_layer(&config.cors))
                .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Serve until Ctrl+C.
pub async fn run_server(config: &AppConfig, services: Services) -> Result<(), AppError> {
    let tokens = TokenTable::from_config(&config.auth);
    let router = create_router(AppState::new(services, tokens), config);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "apiworks HTTP server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}
