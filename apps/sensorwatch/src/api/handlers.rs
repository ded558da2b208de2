//! # API Endpoint Handlers

use super::{
    AppState,
    types::{HealthResponse, SeriesResponse, SessionResponse, StatusResponse},
};
use crate::error::ConnectionError;
use crate::provider::CapabilityProvider;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// READ HANDLERS
// =============================================================================

/// Lifecycle state and delivery counters.
pub async fn status_handler<P: CapabilityProvider>(
    State(state): State<AppState<P>>,
) -> impl IntoResponse {
    let response = StatusResponse::from(state.manager.status());
    (StatusCode::OK, Json(response))
}

/// The latest published series snapshot.
pub async fn series_handler<P: CapabilityProvider>(
    State(state): State<AppState<P>>,
) -> impl IntoResponse {
    let snapshot = state.manager.snapshot();
    (StatusCode::OK, Json(SeriesResponse::from(&snapshot)))
}

// =============================================================================
// SESSION HANDLERS
// =============================================================================

/// Connect, replacing any live session.
pub async fn connect_handler<P: CapabilityProvider>(
    State(state): State<AppState<P>>,
) -> impl IntoResponse {
    match state.manager.connect().await {
        Ok(context) => {
            let session = state.manager.state().session();
            (
                StatusCode::OK,
                Json(SessionResponse::connected(session, &context)),
            )
        }
        Err(e) => {
            tracing::warn!(error = %e, "Connect failed");
            let status = match e {
                ConnectionError::Lifecycle(_) => StatusCode::CONFLICT,
                _ => StatusCode::BAD_GATEWAY,
            };
            (status, Json(SessionResponse::error(e.to_string())))
        }
    }
}

/// Tear down the live session.
pub async fn disconnect_handler<P: CapabilityProvider>(
    State(state): State<AppState<P>>,
) -> impl IntoResponse {
    let had_session = state.manager.disconnect().await;
    let status = if had_session {
        StatusCode::OK
    } else {
        StatusCode::CONFLICT
    };
    (status, Json(SessionResponse::disconnected(had_session)))
}
