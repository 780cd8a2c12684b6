//! HTTP API Module
//!
//! Read-only HTTP surface over the watched server index.
//!
//! This module contains:
//! - `state`: Shared application state
//! - `health`: Liveness and readiness probes
//! - `servers`: Server listing and filtered queries
//! - `metrics`: Prometheus metrics endpoint

mod health;
mod metrics;
mod servers;
mod state;

pub use state::AppState;

use axum::{routing::get, Router};

/// Create the API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health checks
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Observability
        .route("/metrics", get(metrics::get_metrics))
        // Discovery
        .route("/servers", get(servers::list_servers))
        .with_state(state)
}
