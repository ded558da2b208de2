//! # Sensorwatch HTTP API Module
//!
//! The HTTP renderer surface, built on axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /status` - Lifecycle state, session and delivery counters
//! - `GET /series` - Current series snapshot
//! - `POST /session/connect` - (Re)connect to the provider
//! - `POST /session/disconnect` - Tear down the live session
//!
//! ## Security Configuration (Environment Variables)
//!
//! - `SENSORWATCH_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)
//! - `SENSORWATCH_RATE_LIMIT`: Requests per second (default: 100, 0 to disable)
//! - `SENSORWATCH_API_KEY`: If set, requires Bearer token authentication

mod auth;
mod handlers;
mod middleware;
mod types;

pub use auth::get_api_key_from_env;
pub use middleware::{create_rate_limiter, get_rate_limit_from_env};
pub use types::{
    HealthResponse, ReadingJson, SeriesResponse, SessionResponse, StatsJson, StatusResponse,
};

use crate::error::AppError;
use crate::manager::LifecycleManager;
use crate::provider::CapabilityProvider;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state: the lifecycle manager.
pub struct AppState<P> {
    pub manager: Arc<LifecycleManager<P>>,
}

impl<P> AppState<P> {
    #[must_use]
    pub fn new(manager: Arc<LifecycleManager<P>>) -> Self {
        Self { manager }
    }
}

impl<P> Clone for AppState<P> {
    fn clone(&self) -> Self {
        Self {
            manager: Arc::clone(&self.manager),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build CORS layer from `SENSORWATCH_CORS_ORIGINS`.
///
/// - `*` allows all origins
/// - unset defaults to localhost only
/// - otherwise a comma-separated list of origins
fn build_cors_layer() -> CorsLayer {
    let origins_env = std::env::var("SENSORWATCH_CORS_ORIGINS").ok();

    match origins_env.as_deref() {
        Some("*") => {
            tracing::warn!(
                "CORS: Allowing ALL origins (SENSORWATCH_CORS_ORIGINS=*). This is insecure for production!"
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
                    "CORS: No valid origins in SENSORWATCH_CORS_ORIGINS, defaulting to localhost only"
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
            tracing::info!("CORS: No SENSORWATCH_CORS_ORIGINS set, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

/// Restrictive CORS layer for local dashboards.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|origin| origin.parse::<HeaderValue>().ok())
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
/// 3. Rate limiting (if enabled)
/// 4. Authentication (if configured)
pub fn create_router<P: CapabilityProvider>(state: AppState<P>) -> Router {
    let cors = build_cors_layer();

    let rate_limit = get_rate_limit_from_env();
    let rate_limiter = if rate_limit > 0 {
        tracing::info!("Rate limiting enabled: {} requests/second", rate_limit);
        Some(create_rate_limiter(rate_limit))
    } else {
        tracing::info!("Rate limiting disabled");
        None
    };

    let has_auth = get_api_key_from_env().is_some();
    if has_auth {
        tracing::info!("API key authentication enabled");
    } else {
        tracing::warn!(
            "API key authentication DISABLED - session endpoints are publicly accessible. \
             Set SENSORWATCH_API_KEY to enable authentication."
        );
    }

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler::<P>))
        .route("/series", get(handlers::series_handler::<P>))
        .route("/session/connect", post(handlers::connect_handler::<P>))
        .route("/session/disconnect", post(handlers::disconnect_handler::<P>));

    if has_auth {
        router = router.layer(axum_middleware::from_fn(auth::api_key_auth_middleware));
    }

    if let Some(limiter) = rate_limiter {
        router = router.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Serve the API on `addr` until Ctrl+C, then disconnect the session.
pub async fn run_server<P: CapabilityProvider>(
    addr: &str,
    state: AppState<P>,
) -> Result<(), AppError> {
    let manager = Arc::clone(&state.manager);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::Server(format!("Bind failed: {}", e)))?;

    tracing::info!("Sensorwatch HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .map_err(|e| AppError::Server(format!("Server error: {}", e)))?;

    manager.disconnect().await;
    Ok(())
}
