//! Application State
//!
//! Shared state passed to all API handlers.

use crate::observability::MetricsState;
use serverfinder_core::ServerIndex;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub index: Arc<ServerIndex>,
    pub metrics_state: Option<MetricsState>,
}

impl AppState {
    pub fn new(index: Arc<ServerIndex>) -> Self {
        Self {
            index,
            metrics_state: None,
        }
    }

    pub fn with_metrics(mut self, metrics_state: MetricsState) -> Self {
        self.metrics_state = Some(metrics_state);
        self
    }
}
