//! # Bihak HTTP API Module
//!
//! REST API for team dashboards and staff reviewers, built on axum.
//!
//! ## Endpoints
//!
//! Public:
//! - `GET /health` - Health check
//!
//! Team key:
//! - `GET /program` - Phases and exercises
//! - `GET /teams`, `POST /teams` - List or register teams
//! - `GET /teams/{id}` - Team and roster
//! - `POST /teams/{id}/members` - Add a member
//! - `GET /teams/{id}/progress` - Completion figures
//! - `GET /teams/{id}/access` - Unlocked phases and exercises
//! - `GET /teams/{id}/exercises/{exercise_id}/submissions` - Version history
//! - `POST /teams/{id}/exercises/{exercise_id}/submissions` - Save a version
//!
//! Admin key:
//! - `POST /teams/{id}/status` - Withdraw, reactivate or graduate
//! - `GET /reviews/pending` - Review queue
//! - `POST /submissions/{id}/review` - Approve or request revision
//! - `POST /export` - Snapshot download

mod auth;
mod extract;
mod handlers;
mod middleware;
mod types;

pub use auth::key_matches;
pub use middleware::create_rate_limiter;
pub use types::{
    AddMemberRequest, ApiError, ErrorResponse, HealthResponse, HistoryResponse, PhaseView,
    ProgramResponse, QueueResponse, RegisterTeamRequest, ReviewBody, SaveSubmissionRequest,
    SetStatusRequest, TeamListResponse, TeamResponse, VersionView,
};

use crate::config::ServerConfig;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use bihak_core::{IncubatorError, Workspace};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Response header carrying the snapshot checksum on `/export`.
pub const CHECKSUM_HEADER: &str = "x-bihak-checksum";

/// Response header carrying the BLAKE3 digest on `/export`.
pub const HASH_HEADER: &str = "x-bihak-blake3";

/// Request body limit (2 MiB).
const BODY_LIMIT: usize = 2 * 1024 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    pub workspace: Arc<RwLock<Workspace>>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(workspace: Workspace, config: ServerConfig) -> Self {
        Self {
            workspace: Arc::new(RwLock::new(workspace)),
            config: Arc::new(config),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build the CORS layer from `BIHAK_CORS_ORIGINS`.
///
/// - `*`: allows all origins
/// - unset: localhost only
/// - otherwise: comma-separated list of allowed origins
fn build_cors_layer(origins: Option<&str>) -> CorsLayer {
    match origins {
        Some("*") => {
            tracing::warn!(
                "CORS: Allowing ALL origins (BIHAK_CORS_ORIGINS=*). This is insecure for production!"
            );
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!(
                    "CORS: No valid origins in BIHAK_CORS_ORIGINS, defaulting to localhost only"
                );
                build_localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            }
        }
        None => {
            tracing::info!("CORS: No BIHAK_CORS_ORIGINS set, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing
/// 2. CORS
/// 3. Body limit
/// 4. Rate limiting (if enabled)
/// 5. Authentication, per route tier
pub fn create_router(state: AppState) -> Router {
    let config = Arc::clone(&state.config);

    if config.api_key.is_none() && config.admin_key.is_none() {
        tracing::warn!(
            "API key authentication DISABLED - all endpoints are publicly accessible! \
             Set BIHAK_API_KEY and BIHAK_ADMIN_KEY to enable authentication."
        );
    } else {
        tracing::info!(
            team_auth = !config.team_keys().is_empty(),
            admin_auth = !config.admin_keys().is_empty(),
            "API key authentication enabled"
        );
    }

    let team_routes = Router::new()
        .route("/program", get(handlers::program_handler))
        .route(
            "/teams",
            get(handlers::list_teams_handler).post(handlers::register_team_handler),
        )
        .route("/teams/{id}", get(handlers::team_handler))
        .route("/teams/{id}/members", post(handlers::add_member_handler))
        .route("/teams/{id}/progress", get(handlers::progress_handler))
        .route("/teams/{id}/access", get(handlers::access_handler))
        .route(
            "/teams/{id}/exercises/{exercise_id}/submissions",
            get(handlers::history_handler).post(handlers::save_submission_handler),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            Arc::clone(&config),
            auth::team_auth_middleware,
        ));

    let admin_routes = Router::new()
        .route("/teams/{id}/status", post(handlers::set_status_handler))
        .route("/reviews/pending", get(handlers::pending_reviews_handler))
        .route("/submissions/{id}/review", post(handlers::review_handler))
        .route("/export", post(handlers::export_handler))
        .route_layer(axum_middleware::from_fn_with_state(
            Arc::clone(&config),
            auth::admin_auth_middleware,
        ));

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .merge(team_routes)
        .merge(admin_routes);

    if config.rate_limit > 0 {
        tracing::info!("Rate limiting enabled: {} requests/second", config.rate_limit);
        router = router.layer(axum_middleware::from_fn_with_state(
            create_rate_limiter(config.rate_limit),
            middleware::rate_limit_middleware,
        ));
    } else {
        tracing::info!("Rate limiting disabled");
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors_layer(config.cors_origins.as_deref()))
                .layer(axum::extract::DefaultBodyLimit::max(BODY_LIMIT)),
        )
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Start the HTTP server and run until Ctrl-C.
pub async fn run_server(addr: &str, state: AppState) -> Result<(), IncubatorError> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| IncubatorError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!("Bihak HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| IncubatorError::IoError(format!("Server error: {}", e)))
}
