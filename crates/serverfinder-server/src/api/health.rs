//! Health Check Endpoints

use super::state::AppState;
use axum::{extract::State, http::StatusCode};

/// Liveness probe endpoint.
pub async fn health_check() -> &'static str {
    "OK"
}

/// Readiness probe endpoint. Returns OK once a pull cycle has filled the index.
#[tracing::instrument(skip(state))]
pub async fn readiness_check(State(state): State<AppState>) -> Result<&'static str, StatusCode> {
    if state.index.generation() > 0 {
        Ok("READY")
    } else {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}
